//! Raster images as PDF image XObjects.

use image::{ColorType, DynamicImage, ImageFormat};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use crate::error::Error;
use crate::pdf::deflate;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub id: ObjectId,
    pub width_px: u32,
    pub height_px: u32,
}

/// Scale factor for an image of `px_w × px_h` pixels (one pixel is one
/// point at scale 1). The tighter of the enabled limits wins.
pub fn fit_scale(px_w: u32, px_h: u32, max_w_pt: Option<f64>, max_h_pt: Option<f64>) -> f64 {
    let by_width = max_w_pt.filter(|m| *m > 0.0 && px_w > 0).map(|m| m / px_w as f64);
    let by_height = max_h_pt.filter(|m| *m > 0.0 && px_h > 0).map(|m| m / px_h as f64);
    match (by_width, by_height) {
        (Some(w), Some(h)) => w.min(h),
        (Some(s), None) | (None, Some(s)) => s,
        (None, None) => 1.0,
    }
}

/// Adds `data` (JPEG, PNG or WebP) to the document as an image XObject.
/// JPEGs in gray or RGB are passed through untouched; everything else is
/// decoded and stored Flate-compressed, with an `/SMask` for alpha.
pub fn embed_image(doc: &mut Document, data: &[u8]) -> Result<EmbeddedImage, Error> {
    let format = image::guess_format(data).map_err(|e| Error::Image(format!("unrecognized image data: {e}")))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP) {
        return Err(Error::Image(format!("{format:?} images are not supported")));
    }
    let img = image::load_from_memory_with_format(data, format)
        .map_err(|e| Error::Image(format!("failed to decode {format:?} image: {e}")))?;
    let (width_px, height_px) = (img.width(), img.height());

    if format == ImageFormat::Jpeg
        && let Some(color_space) = jpeg_color_space(img.color())
    {
        let id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width_px,
                "Height" => height_px,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            data.to_vec(),
        ));
        return Ok(EmbeddedImage {
            id,
            width_px,
            height_px,
        });
    }

    let id = embed_decoded(doc, &img)?;
    Ok(EmbeddedImage {
        id,
        width_px,
        height_px,
    })
}

fn jpeg_color_space(color: ColorType) -> Option<&'static str> {
    match color {
        ColorType::L8 => Some("DeviceGray"),
        ColorType::Rgb8 => Some("DeviceRGB"),
        _ => None,
    }
}

fn flate_image(doc: &mut Document, width: u32, height: u32, color_space: &str, raw: &[u8]) -> Result<ObjectId, Error> {
    let compressed = deflate(raw)?;
    Ok(doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        compressed,
    )))
}

fn embed_decoded(doc: &mut Document, img: &DynamicImage) -> Result<ObjectId, Error> {
    let (width, height) = (img.width(), img.height());
    if !img.color().has_alpha() {
        return flate_image(doc, width, height, "DeviceRGB", img.to_rgb8().as_raw());
    }

    let rgba = img.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for px in rgba.pixels() {
        rgb.extend_from_slice(&px.0[..3]);
        alpha.push(px.0[3]);
    }
    let mask_id = flate_image(doc, width, height, "DeviceGray", &alpha)?;
    let id = flate_image(doc, width, height, "DeviceRGB", &rgb)?;
    if let Ok(Object::Stream(stream)) = doc.get_object_mut(id) {
        stream.dict.set("SMask", Object::Reference(mask_id));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn fit_scale_prefers_the_tighter_limit() {
        assert_eq!(fit_scale(200, 100, None, None), 1.0);
        assert_eq!(fit_scale(200, 100, Some(100.0), None), 0.5);
        assert_eq!(fit_scale(200, 100, Some(100.0), Some(20.0)), 0.2);
        assert_eq!(fit_scale(200, 100, Some(-1.0), Some(200.0)), 2.0);
    }

    #[test]
    fn png_with_alpha_gets_a_soft_mask() {
        let img = ImageBuffer::from_fn(4, 3, |x, _| Rgba([255, 0, 0, (x * 60) as u8]));
        let png = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let mut doc = Document::with_version("1.7");
        let embedded = embed_image(&mut doc, &png).unwrap();
        assert_eq!((embedded.width_px, embedded.height_px), (4, 3));
        let stream = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"FlateDecode");
        let mask = stream.dict.get(b"SMask").unwrap().as_reference().unwrap();
        let mask = doc.get_object(mask).unwrap().as_stream().unwrap();
        assert_eq!(mask.decompressed_content().unwrap().len(), 12);
    }

    #[test]
    fn jpeg_is_passed_through() {
        let img = ImageBuffer::from_fn(8, 8, |x, y| Rgb([(x * 30) as u8, (y * 30) as u8, 128]));
        let jpeg = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        let mut doc = Document::with_version("1.7");
        let embedded = embed_image(&mut doc, &jpeg).unwrap();
        let stream = doc.get_object(embedded.id).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
        assert_eq!(stream.content, jpeg);
    }

    #[test]
    fn rejects_non_images() {
        let mut doc = Document::with_version("1.7");
        assert!(matches!(embed_image(&mut doc, b"GIF? no, text"), Err(Error::Image(_))));
    }
}
