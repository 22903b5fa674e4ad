//! JSON mapping files: a declarative list of registrations.
//!
//! ```json
//! {
//!   "page_size": { "width": 612, "height": 792 },
//!   "default_font": { "file": "MarkerFelt.ttf", "size": 12, "line_height": 12 },
//!   "default_font_color": "#01579b",
//!   "styles": {
//!     "mf_12": { "size": 12, "line_height": 14 },
//!     "mf_12_centered": { "extends": ["mf_12"], "halign": "center" }
//!   },
//!   "fields": [ { "file": "all", "name": "hp_max", "value": 42 } ],
//!   "text_boxes": [
//!     { "reference": "ac", "file": "all", "page": 0, "x": 51, "y": 212,
//!       "width": 25, "height": 17, "text": 18, "styles": ["mf_12_centered"] }
//!   ],
//!   "images": [ { "file": "all", "page": 2, "x": 29, "y": 39, "path": "portrait.png", "max_width": 178 } ]
//! }
//! ```
//!
//! A boolean text-box value draws as a check mark (`x`, or nothing).
//!
//! With `page_size` every coordinate and font size is in pixels of that
//! page; without it they are fractions of the page.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::model::{
    FieldOptions, ImageOptions, Scalar, StyleOptions, parse_halign, parse_hex_color, parse_valign,
};
use crate::pixels::check_mark;
use crate::registry::Registries;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DefaultFont {
    pub file: String,
    pub size: f32,
    #[serde(default)]
    pub line_height: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StyleSpec {
    #[serde(default)]
    pub extends: Vec<String>,
    pub font: Option<String>,
    pub size: Option<f32>,
    pub line_height: Option<f32>,
    pub color: Option<String>,
    pub halign: Option<String>,
    pub valign: Option<String>,
    pub multiline: Option<bool>,
    pub overflow: Option<bool>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub debug: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldSpec {
    #[serde(default = "all_files")]
    pub file: String,
    pub name: String,
    #[serde(default)]
    pub value: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextBoxSpec {
    pub reference: String,
    #[serde(default = "all_files")]
    pub file: String,
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub text: JsonValue,
    /// Named styles, merged left to right.
    #[serde(default)]
    pub styles: Vec<String>,
    /// Applied on top of the named styles.
    #[serde(default)]
    pub style: Option<StyleSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageSpec {
    #[serde(default = "all_files")]
    pub file: String,
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub path: String,
    #[serde(default)]
    pub max_width: Option<f32>,
    #[serde(default)]
    pub max_height: Option<f32>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Mapping {
    #[serde(default)]
    pub page_size: Option<PageSize>,
    #[serde(default)]
    pub default_font: Option<DefaultFont>,
    #[serde(default)]
    pub default_font_color: Option<String>,
    #[serde(default)]
    pub styles: BTreeMap<String, StyleSpec>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub text_boxes: Vec<TextBoxSpec>,
    #[serde(default)]
    pub images: Vec<ImageSpec>,
}

fn all_files() -> String {
    crate::model::ALL_FILES.to_string()
}

fn scalar_from_json(value: &JsonValue) -> Scalar {
    match value {
        JsonValue::Null => Scalar::Empty,
        JsonValue::Bool(b) => Scalar::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Scalar::Integer(i),
            None => n.as_f64().map(Scalar::Number).unwrap_or(Scalar::Empty),
        },
        JsonValue::String(s) => Scalar::Text(s.clone()),
        other => Scalar::Text(other.to_string()),
    }
}

/// Text boxes draw booleans as check marks.
fn text_from_json(value: &JsonValue) -> Scalar {
    match value {
        JsonValue::Bool(b) => Scalar::from(check_mark(*b)),
        other => scalar_from_json(other),
    }
}

/// Divisors turning mapping units into page fractions.
#[derive(Clone, Copy)]
struct Units {
    width: f32,
    height: f32,
}

impl Mapping {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let mapping: Mapping = serde_json::from_str(json)?;
        mapping.validate()?;
        Ok(mapping)
    }

    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Style references, alignment names and colors are checked up front so
    /// a typo fails the whole mapping instead of silently changing a box.
    fn validate(&self) -> Result<(), Error> {
        if let Some(size) = self.page_size
            && !(size.width > 0.0 && size.height > 0.0)
        {
            return Err(Error::Validation(format!(
                "page_size must be positive, got {}x{}",
                size.width, size.height
            )));
        }
        if let Some(color) = &self.default_font_color
            && parse_hex_color(color).is_none()
        {
            return Err(Error::Validation(format!("invalid default_font_color '{color}'")));
        }
        for (name, spec) in &self.styles {
            self.check_style(name, spec)?;
            self.resolve_style(name, &mut HashSet::new())?;
        }
        for text_box in &self.text_boxes {
            for name in &text_box.styles {
                if !self.styles.contains_key(name) {
                    return Err(Error::Validation(format!(
                        "text box {} uses unknown style '{name}'",
                        text_box.reference
                    )));
                }
            }
            if let Some(spec) = &text_box.style {
                self.check_style(&text_box.reference, spec)?;
            }
        }
        Ok(())
    }

    fn check_style(&self, name: &str, spec: &StyleSpec) -> Result<(), Error> {
        if let Some(v) = &spec.halign
            && parse_halign(v).is_none()
        {
            return Err(Error::Validation(format!("style {name}: unknown halign '{v}'")));
        }
        if let Some(v) = &spec.valign
            && parse_valign(v).is_none()
        {
            return Err(Error::Validation(format!("style {name}: unknown valign '{v}'")));
        }
        if let Some(v) = &spec.color
            && parse_hex_color(v).is_none()
        {
            return Err(Error::Validation(format!("style {name}: invalid color '{v}'")));
        }
        for parent in &spec.extends {
            if !self.styles.contains_key(parent) {
                return Err(Error::Validation(format!("style {name} extends unknown style '{parent}'")));
            }
        }
        Ok(())
    }

    fn units(&self) -> Units {
        match self.page_size {
            Some(size) => Units {
                width: size.width,
                height: size.height,
            },
            None => Units {
                width: 1.0,
                height: 1.0,
            },
        }
    }

    fn spec_options(&self, spec: &StyleSpec) -> StyleOptions {
        let units = self.units();
        let mut options = StyleOptions::new();
        options.font_file = spec.font.clone();
        options.size = spec.size.map(|v| v / units.height);
        options.line_height = spec.line_height.map(|v| v / units.height);
        options.color = spec.color.as_deref().and_then(parse_hex_color);
        options.halign = spec.halign.as_deref().and_then(parse_halign);
        options.valign = spec.valign.as_deref().and_then(parse_valign);
        options.multiline = spec.multiline;
        options.overflow = spec.overflow;
        options.prefix = spec.prefix.clone();
        options.suffix = spec.suffix.clone();
        options.debug = spec.debug;
        options
    }

    /// A named style with everything it extends merged underneath it.
    fn resolve_style(&self, name: &str, seen: &mut HashSet<String>) -> Result<StyleOptions, Error> {
        if !seen.insert(name.to_string()) {
            return Err(Error::Validation(format!("style {name} extends itself")));
        }
        let spec = self
            .styles
            .get(name)
            .ok_or_else(|| Error::Validation(format!("unknown style '{name}'")))?;
        let mut options = StyleOptions::new();
        for parent in &spec.extends {
            options = options.merge(&self.resolve_style(parent, seen)?);
        }
        seen.remove(name);
        Ok(options.merge(&self.spec_options(spec)))
    }

    /// Registers everything in the mapping. Individual entries the
    /// registries reject are reported through their notifier and skipped.
    pub fn apply(&self, registries: &mut Registries) -> Result<(), Error> {
        let units = self.units();
        if let Some(font) = &self.default_font {
            registries.default_font(
                &font.file,
                font.size / units.height,
                font.line_height.map(|lh| lh / units.height),
            );
        }
        if let Some(color) = &self.default_font_color {
            registries.default_font_color(color);
        }

        for field in &self.fields {
            registries.field(
                &field.file,
                &field.name,
                scalar_from_json(&field.value),
                FieldOptions::default(),
            );
        }

        for text_box in &self.text_boxes {
            let mut options = StyleOptions::new();
            for name in &text_box.styles {
                options = options.merge(&self.resolve_style(name, &mut HashSet::new())?);
            }
            if let Some(spec) = &text_box.style {
                options = options.merge(&self.spec_options(spec));
            }
            registries.text_box(
                &text_box.reference,
                &text_box.file,
                text_box.page,
                text_box.x / units.width,
                text_box.y / units.height,
                text_box.width / units.width,
                text_box.height / units.height,
                text_from_json(&text_box.text),
                &options,
            );
        }

        for image in &self.images {
            registries.image(
                &image.file,
                image.page,
                image.x / units.width,
                image.y / units.height,
                &image.path,
                image.max_width.filter(|m| *m > 0.0).map(|m| m / units.width),
                image.max_height.filter(|m| *m > 0.0).map(|m| m / units.height),
                ImageOptions { debug: image.debug },
            );
        }

        log::info!(
            "Mapping registered {} fields, {} text boxes, {} images",
            registries.fields.len(),
            registries.text_boxes.len(),
            registries.images.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HAlign, VAlign};

    const SHEET: &str = r##"{
        "page_size": { "width": 612, "height": 792 },
        "default_font": { "file": "MarkerFelt.ttf", "size": 12, "line_height": 12 },
        "default_font_color": "#01579b",
        "styles": {
            "mf_12": { "size": 12, "line_height": 14 },
            "mf_12_centered": { "extends": ["mf_12"], "halign": "center" }
        },
        "fields": [
            { "name": "hp_max", "value": 42 },
            { "file": "b.pdf", "name": "shield", "value": true }
        ],
        "text_boxes": [
            { "reference": "ac", "page": 0, "x": 51, "y": 212, "width": 25, "height": 17,
              "text": 18, "styles": ["mf_12_centered"], "style": { "valign": "top" } },
            { "reference": "empty", "page": 0, "x": 0, "y": 0, "width": 10, "height": 10, "text": null }
        ],
        "images": [
            { "page": 2, "x": 29, "y": 39, "path": "portrait.png", "max_width": 178, "max_height": -1 }
        ]
    }"##;

    #[test]
    fn applies_a_pixel_mapping() {
        let mapping = Mapping::from_json(SHEET).unwrap();
        let mut reg = Registries::new();
        mapping.apply(&mut reg).unwrap();

        assert_eq!(reg.fields.value_or("a.pdf", "hp_max", 0), Scalar::Integer(42));
        assert_eq!(reg.fields.value_or("b.pdf", "shield", false), Scalar::Bool(true));
        assert_eq!(reg.defaults().color, [0x01, 0x57, 0x9b]);

        assert_eq!(reg.text_boxes.len(), 1);
        let Some(ac) = reg.text_boxes.resolve("a.pdf", "ac") else {
            panic!("text box missing");
        };
        assert_eq!(ac.text, "18");
        assert_eq!(ac.x, 51.0 / 612.0);
        assert_eq!(ac.style.size, 12.0 / 792.0);
        assert_eq!(ac.style.line_height, Some(14.0 / 792.0));
        assert_eq!(ac.style.halign, HAlign::Center);
        assert_eq!(ac.style.valign, VAlign::Top);

        let Some(image) = reg.images.for_file("a.pdf").next() else {
            panic!("image missing");
        };
        assert_eq!(image.max_width, Some(178.0 / 612.0));
        assert_eq!(image.max_height, None);
    }

    #[test]
    fn fractions_without_page_size() {
        let mapping = Mapping::from_json(
            r#"{ "text_boxes": [ { "reference": "r", "page": 0, "x": 0.25, "y": 0.1,
                 "width": 0.5, "height": 0.05, "text": "Hi" } ] }"#,
        )
        .unwrap();
        let mut reg = Registries::new();
        mapping.apply(&mut reg).unwrap();
        let Some(b) = reg.text_boxes.resolve("any.pdf", "r") else {
            panic!("text box missing");
        };
        assert_eq!((b.x, b.y, b.width, b.height), (0.25, 0.1, 0.5, 0.05));
    }

    #[test]
    fn boolean_text_boxes_draw_check_marks() {
        let mapping = Mapping::from_json(
            r#"{ "text_boxes": [
                { "reference": "trained", "page": 0, "x": 0.1, "y": 0.1, "width": 0.02, "height": 0.02, "text": true },
                { "reference": "expert", "page": 0, "x": 0.2, "y": 0.1, "width": 0.02, "height": 0.02, "text": false }
            ] }"#,
        )
        .unwrap();
        let mut reg = Registries::new();
        mapping.apply(&mut reg).unwrap();
        assert_eq!(reg.text_boxes.len(), 1);
        assert_eq!(reg.text_boxes.resolve("a.pdf", "trained").map(|b| b.text.as_str()), Some("x"));
    }

    #[test]
    fn rejects_unknown_styles_and_bad_alignment() {
        let unknown = r#"{ "text_boxes": [ { "reference": "r", "page": 0, "x": 0, "y": 0,
            "width": 0.1, "height": 0.1, "text": "x", "styles": ["nope"] } ] }"#;
        assert!(matches!(Mapping::from_json(unknown), Err(Error::Validation(_))));

        let bad_align = r#"{ "styles": { "s": { "halign": "justify" } } }"#;
        assert!(matches!(Mapping::from_json(bad_align), Err(Error::Validation(_))));

        let cycle = r#"{ "styles": { "a": { "extends": ["b"] }, "b": { "extends": ["a"] } } }"#;
        assert!(matches!(Mapping::from_json(cycle), Err(Error::Validation(_))));

        assert!(matches!(Mapping::from_json("{ not json"), Err(Error::Mapping(_))));

        let non_ascii_color = r##"{ "default_font_color": "#aééa" }"##;
        assert!(matches!(Mapping::from_json(non_ascii_color), Err(Error::Validation(_))));
        let non_ascii_style = r#"{ "styles": { "s": { "color": "aééa" } } }"#;
        assert!(matches!(Mapping::from_json(non_ascii_style), Err(Error::Validation(_))));
    }
}
