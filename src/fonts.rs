use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use ttf_parser::Face;

use crate::error::Error;
use crate::pdf::{ResourceNames, deflate};
use crate::resource::{FilesystemResourceProvider, ResourceProvider};

/// Environment variable naming the shared font directory.
pub const SHARED_FONTS_ENV: &str = "SHEETFILL_FONTS";
const DEFAULT_SHARED_FONTS_DIR: &str = "fonts";
const FONT_RESOURCE_PREFIX: &str = "SfF";

/// Glyph advances for WinAnsi codes 32..=255 plus the natural line height,
/// everything scaled to a 1000-unit em.
#[derive(Clone, Debug, PartialEq)]
pub struct FontMetrics {
    widths_1000: Vec<f32>,
    line_h_ratio: f32,
}

impl FontMetrics {
    /// Every character advances by `advance_1000`. Mostly useful for tests.
    pub fn uniform(advance_1000: f32, line_h_ratio: f32) -> Self {
        Self {
            widths_1000: vec![advance_1000; 224],
            line_h_ratio,
        }
    }

    pub fn from_font_data(font_data: &[u8]) -> Option<Self> {
        let face = Face::parse(font_data, 0).ok()?;
        Some(Self::from_face(&face))
    }

    fn from_face(face: &Face) -> Self {
        let units = face.units_per_em() as f32;
        let widths_1000 = (32u8..=255u8)
            .map(|byte| {
                face.glyph_index(winansi_to_char(byte))
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map(|adv| adv as f32 / units * 1000.0)
                    .unwrap_or(0.0)
            })
            .collect();
        let line_gap = face.line_gap() as f32;
        Self {
            widths_1000,
            line_h_ratio: (face.ascender() as f32 - face.descender() as f32 + line_gap) / units,
        }
    }

    /// Advance of one WinAnsi byte in 1/1000 em. Control bytes have no width.
    pub fn advance_1000(&self, byte: u8) -> f32 {
        if byte < 32 {
            return 0.0;
        }
        self.widths_1000
            .get((byte - 32) as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// Natural line height as a multiple of the font size.
    pub fn line_h_ratio(&self) -> f32 {
        self.line_h_ratio
    }

    pub(crate) fn widths(&self) -> &[f32] {
        &self.widths_1000
    }
}

/// A font embedded into one output document.
#[derive(Debug)]
pub struct EmbeddedFont {
    pub filename: String,
    /// Name under which pages reference the font (`/SfF1 12 Tf`).
    pub resource_name: String,
    pub font_id: ObjectId,
    pub metrics: FontMetrics,
}

/// Ordered candidate locations for font files: the provider's own
/// directory first, the shared directory second.
#[derive(Debug, Clone)]
pub struct FontSources {
    candidates: Vec<Arc<dyn ResourceProvider>>,
}

impl FontSources {
    pub fn new(provider: Arc<dyn ResourceProvider>, shared: Arc<dyn ResourceProvider>) -> Self {
        Self {
            candidates: vec![provider, shared],
        }
    }

    /// A single location, for hosts without a provider-specific directory.
    pub fn single(source: Arc<dyn ResourceProvider>) -> Self {
        Self {
            candidates: vec![source],
        }
    }

    pub fn from_dirs(provider_dir: impl Into<PathBuf>, shared_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            Arc::new(FilesystemResourceProvider::new(provider_dir.into())),
            Arc::new(FilesystemResourceProvider::new(shared_dir.into())),
        )
    }

    pub fn candidates(&self) -> &[Arc<dyn ResourceProvider>] {
        &self.candidates
    }
}

/// Shared font directory: `$SHEETFILL_FONTS` when set, `./fonts` otherwise.
pub fn shared_font_dir() -> PathBuf {
    match std::env::var(SHARED_FONTS_ENV) {
        Ok(val) if !val.trim().is_empty() => PathBuf::from(val.trim()),
        _ => PathBuf::from(DEFAULT_SHARED_FONTS_DIR),
    }
}

/// Fonts embedded so far into one document. Create one per render.
pub struct FontCache<'s> {
    sources: &'s FontSources,
    fonts: HashMap<String, Arc<EmbeddedFont>>,
}

impl<'s> FontCache<'s> {
    pub fn new(sources: &'s FontSources) -> Self {
        Self {
            sources,
            fonts: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Embeds `filename` into `doc` on first use and returns the cached
    /// handle afterwards. The resource name comes from `names`. Fails when
    /// no candidate location yields a font.
    pub fn embed(
        &mut self,
        doc: &mut Document,
        names: &mut ResourceNames,
        filename: &str,
    ) -> Result<Arc<EmbeddedFont>, Error> {
        if let Some(font) = self.fonts.get(filename) {
            return Ok(font.clone());
        }

        let mut tried = Vec::new();
        for source in self.sources.candidates() {
            let data = match source.load(filename) {
                Ok(data) => data,
                Err(e) => {
                    tried.push(e.to_string());
                    continue;
                }
            };
            match embed_truetype(doc, filename, &data) {
                Some((font_id, metrics)) => {
                    let resource_name = names.next(FONT_RESOURCE_PREFIX);
                    log::debug!(
                        "Embedded font {filename} from {} as /{resource_name}",
                        source.describe()
                    );
                    let font = Arc::new(EmbeddedFont {
                        filename: filename.to_string(),
                        resource_name,
                        font_id,
                        metrics,
                    });
                    self.fonts.insert(filename.to_string(), font.clone());
                    return Ok(font);
                }
                None => tried.push(format!("{} (not a usable TrueType/OpenType font)", source.describe())),
            }
        }

        Err(Error::FontEmbed {
            font: filename.to_string(),
            tried,
        })
    }
}

fn postscript_name(face: &Face, filename: &str) -> String {
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME
            && let Some(s) = name.to_string()
            && !s.trim().is_empty()
        {
            return s.replace(' ', "");
        }
    }
    let stem = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .split('.')
        .next()
        .unwrap_or(filename);
    let cleaned: String = stem.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}

/// Windows-1252 (WinAnsi) byte to Unicode char mapping.
/// Bytes 0x80-0x9F are remapped; all others map directly to their Unicode codepoint.
fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}', // bullet
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// WinAnsi byte for a char, `None` when the encoding has no slot for it.
pub(crate) fn char_to_winansi(c: char) -> Option<u8> {
    match c as u32 {
        0x0000..=0x007F => Some(c as u8),
        0x00A0..=0x00FF => Some(c as u8), // Latin-1 supplement maps directly
        0x20AC => Some(0x80),
        0x201A => Some(0x82),
        0x0192 => Some(0x83),
        0x201E => Some(0x84),
        0x2026 => Some(0x85),
        0x2020 => Some(0x86),
        0x2021 => Some(0x87),
        0x02C6 => Some(0x88),
        0x2030 => Some(0x89),
        0x0160 => Some(0x8A),
        0x2039 => Some(0x8B),
        0x0152 => Some(0x8C),
        0x017D => Some(0x8E),
        0x2018 => Some(0x91),
        0x2019 => Some(0x92),
        0x201C => Some(0x93),
        0x201D => Some(0x94),
        0x2022 => Some(0x95), // bullet
        0x2013 => Some(0x96),
        0x2014 => Some(0x97),
        0x02DC => Some(0x98),
        0x2122 => Some(0x99),
        0x0161 => Some(0x9A),
        0x203A => Some(0x9B),
        0x0153 => Some(0x9C),
        0x017E => Some(0x9E),
        0x0178 => Some(0x9F),
        _ => None,
    }
}

/// Convert a UTF-8 string to WinAnsi (Windows-1252) bytes for PDF Str encoding.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars().filter_map(char_to_winansi).collect()
}

/// Embed a TrueType/OpenType font (raw bytes) into the document.
fn embed_truetype(
    doc: &mut Document,
    filename: &str,
    font_data: &[u8],
) -> Option<(ObjectId, FontMetrics)> {
    let face = Face::parse(font_data, 0).ok()?;
    let metrics = FontMetrics::from_face(&face);

    let units = face.units_per_em() as f32;
    let ascent = face.ascender() as f32 / units * 1000.0;
    let descent = face.descender() as f32 / units * 1000.0;
    let cap_height = face
        .capital_height()
        .map(|h| h as f32 / units * 1000.0)
        .unwrap_or(700.0);
    let bb = face.global_bounding_box();
    let bbox: Vec<Object> = [bb.x_min, bb.y_min, bb.x_max, bb.y_max]
        .iter()
        .map(|v| Object::Real(*v as f32 / units * 1000.0))
        .collect();

    let ps_name = postscript_name(&face, filename);
    let compressed = deflate(font_data).ok()?;
    let data_len = i64::try_from(font_data.len()).ok()?;
    let data_id = doc.add_object(Stream::new(
        dictionary! {
            "Length1" => data_len,
            "Filter" => "FlateDecode",
        },
        compressed,
    ));

    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => ps_name.clone(),
        "Flags" => 32,
        "FontBBox" => bbox,
        "ItalicAngle" => Object::Real(0.0),
        "Ascent" => Object::Real(ascent),
        "Descent" => Object::Real(descent),
        "CapHeight" => Object::Real(cap_height),
        "StemV" => 80,
        "FontFile2" => data_id,
    });

    let widths: Vec<Object> = metrics.widths().iter().map(|w| Object::Real(*w)).collect();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => ps_name,
        "Encoding" => "WinAnsiEncoding",
        "FirstChar" => 32,
        "LastChar" => 255,
        "FontDescriptor" => descriptor_id,
        "Widths" => widths,
    });

    Some((font_id, metrics))
}
