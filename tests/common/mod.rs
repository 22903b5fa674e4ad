#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use sheetfill_pdf::fonts::FontSources;
use sheetfill_pdf::resource::{FilesystemResourceProvider, InMemoryResourceProvider};
use sheetfill_pdf::{DocumentAssembler, RecordingNotifier, Registries};

pub const DEJAVU_DIR: &str = "/usr/share/fonts/truetype/dejavu";

/// A letter-sized template with `pages` pages. Page 0 carries a text
/// field `hp_max`, a checkbox `shield` and a text field `notes`.
pub fn template(pages: usize) -> Vec<u8> {
    template_sized(pages, 612, 792)
}

pub fn template_sized(pages: usize, width: i64, height: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let on = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
    let off = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));

    let mut kids = Vec::new();
    let mut fields = Vec::new();
    for i in 0..pages {
        let content = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m 10 10 l S".to_vec()));
        let page_id = doc.new_object_id();
        let mut annots = Vec::new();
        if i == 0 {
            let hp = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "FT" => "Tx",
                "T" => Object::string_literal("hp_max"),
                "Rect" => vec![Object::Integer(40), Object::Integer(700), Object::Integer(120), Object::Integer(720)],
                "P" => page_id,
            });
            let shield = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "FT" => "Btn",
                "T" => Object::string_literal("shield"),
                "AS" => "Off",
                "AP" => dictionary! { "N" => dictionary! { "Off" => off, "Raised" => on } },
                "Rect" => vec![Object::Integer(40), Object::Integer(650), Object::Integer(52), Object::Integer(662)],
                "P" => page_id,
            });
            let notes = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "FT" => "Tx",
                "T" => Object::string_literal("notes"),
                "Rect" => vec![Object::Integer(40), Object::Integer(500), Object::Integer(300), Object::Integer(600)],
                "P" => page_id,
            });
            for id in [hp, shield, notes] {
                annots.push(Object::Reference(id));
                fields.push(Object::Reference(id));
            }
        }
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content,
                "Annots" => annots,
            }),
        );
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => pages as i64,
            "Kids" => kids,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(width), Object::Integer(height)],
            "Resources" => dictionary! {},
        }),
    );
    let acroform = doc.add_object(dictionary! { "Fields" => fields });
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acroform,
    });
    doc.trailer.set("Root", catalog);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn recorded() -> (Arc<RecordingNotifier>, Registries) {
    let notifier = Arc::new(RecordingNotifier::new());
    let registries = Registries::with_notifier(notifier.clone());
    (notifier, registries)
}

/// An assembler with no fonts and the given in-memory assets.
pub fn assembler_without_fonts(assets: Arc<InMemoryResourceProvider>) -> DocumentAssembler {
    DocumentAssembler::new(
        FontSources::single(Arc::new(InMemoryResourceProvider::new("fonts"))),
        assets,
    )
}

/// An assembler reading fonts from the system DejaVu directory, or `None`
/// when it is not installed.
pub fn assembler_with_dejavu(assets: Arc<InMemoryResourceProvider>) -> Option<DocumentAssembler> {
    let dir = PathBuf::from(DEJAVU_DIR);
    if !dir.join("DejaVuSans.ttf").is_file() {
        println!("[SKIP] {DEJAVU_DIR}/DejaVuSans.ttf not installed");
        return None;
    }
    Some(DocumentAssembler::new(
        FontSources::single(Arc::new(FilesystemResourceProvider::new(dir))),
        assets,
    ))
}

pub fn field<'a>(doc: &'a Document, name: &str) -> &'a Dictionary {
    for (_, object) in doc.objects.iter() {
        if let Ok(dict) = object.as_dict()
            && let Ok(t) = dict.get(b"T")
            && lopdf::decode_text_string(t).ok().as_deref() == Some(name)
        {
            return dict;
        }
    }
    panic!("field {name} not found");
}

pub fn page_contents(doc: &Document, page: ObjectId) -> Vec<ObjectId> {
    let dict = doc.get_dictionary(page).unwrap();
    match dict.get(b"Contents").unwrap() {
        Object::Reference(id) => vec![*id],
        Object::Array(items) => items.iter().map(|o| o.as_reference().unwrap()).collect(),
        other => panic!("unexpected Contents {other:?}"),
    }
}

/// Decoded content of every stream on the page, concatenated.
pub fn page_text(doc: &Document, page: ObjectId) -> String {
    let mut out = String::new();
    for id in page_contents(doc, page) {
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        out.push_str(&String::from_utf8_lossy(&data));
        out.push('\n');
    }
    out
}

/// Literal strings shown with `Tj`, in content order.
pub fn shown_strings(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = content;
    while let Some(end) = rest.find(") Tj") {
        if let Some(start) = rest[..end].rfind('(') {
            out.push(rest[start + 1..end].to_string());
        }
        rest = &rest[end + 4..];
    }
    out
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
