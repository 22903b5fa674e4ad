//! Pending work for a render: field values, images and text boxes.
//!
//! Registration never fails loudly. Invalid entries are reported through
//! the [`Notifier`] and dropped, duplicates keep the first registration.

use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::model::{
    ALL_FILES, FieldAssignment, FieldOptions, FontDefaults, ImageOptions, ImagePlacement, ParseContext,
    Scalar, StyleOptions, TextBoxPlacement, TextStyle, Value, file_matches, parse_hex_color,
};
use crate::notify::{LogNotifier, Notifier, Severity};

/// Why a registration was not stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejected {
    Invalid(String),
    Duplicate(String),
}

impl Rejected {
    fn severity(&self) -> Severity {
        match self {
            Rejected::Invalid(_) => Severity::Error,
            Rejected::Duplicate(_) => Severity::Warn,
        }
    }

    fn message(&self) -> &str {
        match self {
            Rejected::Invalid(m) | Rejected::Duplicate(m) => m,
        }
    }
}

fn require_text(what: &str, val: &str) -> Result<(), Rejected> {
    if val.trim().is_empty() {
        return Err(Rejected::Invalid(format!("{what} must not be empty")));
    }
    Ok(())
}

fn require_fraction(what: &str, val: f32) -> Result<(), Rejected> {
    if !val.is_finite() || !(0.0..=1.0).contains(&val) {
        return Err(Rejected::Invalid(format!("{what} must be between 0 and 1, got {val}")));
    }
    Ok(())
}

fn file_key(file: &str) -> String {
    file.trim().to_ascii_lowercase()
}

#[derive(Debug, Default)]
pub struct FieldRegistry {
    entries: IndexMap<(String, String), FieldAssignment>,
}

impl FieldRegistry {
    pub fn register(&mut self, entry: FieldAssignment) -> Result<(), Rejected> {
        require_text("field file", &entry.file)?;
        require_text("field name", &entry.name)?;
        match self.entries.entry((file_key(&entry.file), entry.name.clone())) {
            Entry::Occupied(_) => Err(Rejected::Duplicate(format!(
                "Field {} has already been defined for {}",
                entry.name, entry.file
            ))),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    /// An entry for exactly `file` wins over one registered for every file.
    pub fn resolve(&self, file: &str, name: &str) -> Option<&FieldAssignment> {
        self.entries
            .get(&(file_key(file), name.to_string()))
            .or_else(|| self.entries.get(&(ALL_FILES.to_string(), name.to_string())))
    }

    pub fn exists(&self, file: &str, name: &str) -> bool {
        self.resolve(file, name).is_some()
    }

    /// Resolved value of a field, or `default` when nothing is registered.
    pub fn value_or(&self, file: &str, name: &str, default: impl Into<Scalar>) -> Scalar {
        match self.resolve(file, name) {
            Some(entry) => entry.resolve(file),
            None => default.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ImageRegistry {
    entries: IndexMap<(usize, u32, u32), ImagePlacement>,
}

impl ImageRegistry {
    pub fn register(&mut self, entry: ImagePlacement) -> Result<(), Rejected> {
        require_text("image file", &entry.file)?;
        require_text("image path", &entry.path)?;
        require_fraction("image x", entry.x)?;
        require_fraction("image y", entry.y)?;
        for (what, max) in [("image max width", entry.max_width), ("image max height", entry.max_height)] {
            if let Some(v) = max
                && !v.is_finite()
            {
                return Err(Rejected::Invalid(format!("{what} must be a number, got {v}")));
            }
        }
        match self.entries.entry((entry.page, entry.x.to_bits(), entry.y.to_bits())) {
            Entry::Occupied(_) => Err(Rejected::Duplicate(format!(
                "An image has already been placed on page {} at ({}, {})",
                entry.page, entry.x, entry.y
            ))),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, page: usize, x: f32, y: f32) -> Option<&ImagePlacement> {
        self.entries.get(&(page, x.to_bits(), y.to_bits()))
    }

    /// Images that apply to `file`, in registration order.
    pub fn for_file<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a ImagePlacement> + 'a {
        self.entries.values().filter(move |e| file_matches(&e.file, file))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// References are labels, not keys: several boxes may share one.
#[derive(Debug, Default)]
pub struct TextBoxRegistry {
    entries: Vec<TextBoxPlacement>,
}

impl TextBoxRegistry {
    pub fn register(&mut self, entry: TextBoxPlacement) -> Result<(), Rejected> {
        require_text("text box file", &entry.file)?;
        require_fraction("text box x", entry.x)?;
        require_fraction("text box y", entry.y)?;
        require_fraction("text box width", entry.width)?;
        require_fraction("text box height", entry.height)?;
        if !(entry.style.size.is_finite() && entry.style.size > 0.0) {
            return Err(Rejected::Invalid(format!(
                "text box font size must be positive, got {}",
                entry.style.size
            )));
        }
        if let Some(lh) = entry.style.line_height
            && !(lh.is_finite() && lh > 0.0)
        {
            return Err(Rejected::Invalid(format!("text box line height must be positive, got {lh}")));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// First box labelled `reference`, preferring one registered for exactly `file`.
    pub fn resolve(&self, file: &str, reference: &str) -> Option<&TextBoxPlacement> {
        let labelled = || self.entries.iter().filter(move |e| e.reference == reference);
        labelled()
            .find(|e| e.file.eq_ignore_ascii_case(file))
            .or_else(|| labelled().find(|e| e.file.eq_ignore_ascii_case(ALL_FILES)))
    }

    pub fn for_file<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a TextBoxPlacement> + 'a {
        self.entries.iter().filter(move |e| file_matches(&e.file, file))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The three registries plus the defaults every text box starts from.
pub struct Registries {
    pub fields: FieldRegistry,
    pub images: ImageRegistry,
    pub text_boxes: TextBoxRegistry,
    defaults: FontDefaults,
    notifier: Arc<dyn Notifier>,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registries")
            .field("fields", &self.fields.len())
            .field("images", &self.images.len())
            .field("text_boxes", &self.text_boxes.len())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl Registries {
    pub fn new() -> Self {
        Self::with_notifier(Arc::new(LogNotifier))
    }

    pub fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            fields: FieldRegistry::default(),
            images: ImageRegistry::default(),
            text_boxes: TextBoxRegistry::default(),
            defaults: FontDefaults::default(),
            notifier,
        }
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn defaults(&self) -> &FontDefaults {
        &self.defaults
    }

    fn report(&self, result: Result<(), Rejected>) -> bool {
        match result {
            Ok(()) => true,
            Err(rejected) => {
                self.notifier.notify(rejected.severity(), rejected.message());
                false
            }
        }
    }

    /// Font file, size and optional line height (fractions of page height)
    /// for every text box registered afterwards.
    pub fn default_font(&mut self, font_file: &str, size: f32, line_height: Option<f32>) -> bool {
        let checked = require_text("default font", font_file).and_then(|()| {
            if size.is_finite() && size > 0.0 {
                Ok(())
            } else {
                Err(Rejected::Invalid(format!("default font size must be positive, got {size}")))
            }
        });
        if !self.report(checked) {
            return false;
        }
        self.defaults.font_file = font_file.to_string();
        self.defaults.size = size;
        self.defaults.line_height = line_height.filter(|lh| lh.is_finite() && *lh > 0.0);
        true
    }

    pub fn default_font_color(&mut self, hex: &str) -> bool {
        match parse_hex_color(hex) {
            Some(rgb) => {
                self.defaults.color = rgb;
                true
            }
            None => self.report(Err(Rejected::Invalid(format!("invalid default font color '{hex}'")))),
        }
    }

    pub fn field(&mut self, file: &str, name: &str, value: impl Into<Value>, options: FieldOptions) -> bool {
        let entry = FieldAssignment {
            file: file.trim().to_string(),
            name: name.trim().to_string(),
            value: value.into(),
            parse_fn: options.parse_value,
        };
        let result = self.fields.register(entry);
        self.report(result)
    }

    /// Box geometry is given in fractions of the page. The text is resolved
    /// now; a box whose text is blank is not stored.
    #[allow(clippy::too_many_arguments)]
    pub fn text_box(
        &mut self,
        reference: &str,
        file: &str,
        page: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        text: impl Into<Value>,
        options: &StyleOptions,
    ) -> bool {
        let style = TextStyle::from_defaults(&self.defaults).with_options(options);
        let ctx = ParseContext { file, name: reference };
        let mut value = text.into().resolve(&ctx);
        if let Some(parse) = &style.value_parser {
            value = parse(value, &ctx);
        }
        let text = value.to_text();
        if text.trim().is_empty() {
            self.notifier
                .notify(Severity::Debug, &format!("Text box {reference} on page {page} is empty, skipped"));
            return false;
        }

        let entry = TextBoxPlacement {
            reference: reference.to_string(),
            file: file.trim().to_string(),
            page,
            x,
            y,
            width,
            height,
            text,
            style,
        };
        let result = self.text_boxes.register(entry);
        self.report(result)
    }

    /// Maxima are fractions of the page width/height; non-positive values
    /// leave that dimension unconstrained.
    #[allow(clippy::too_many_arguments)]
    pub fn image(
        &mut self,
        file: &str,
        page: usize,
        x: f32,
        y: f32,
        path: &str,
        max_width: Option<f32>,
        max_height: Option<f32>,
        options: ImageOptions,
    ) -> bool {
        let entry = ImagePlacement {
            file: file.trim().to_string(),
            page,
            x,
            y,
            path: path.to_string(),
            max_width: max_width.filter(|v| *v > 0.0),
            max_height: max_height.filter(|v| *v > 0.0),
            options,
        };
        let result = self.images.register(entry);
        self.report(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HAlign, VAlign};
    use crate::notify::RecordingNotifier;

    fn recorded() -> (Arc<RecordingNotifier>, Registries) {
        let notifier = Arc::new(RecordingNotifier::new());
        let registries = Registries::with_notifier(notifier.clone());
        (notifier, registries)
    }

    #[test]
    fn first_field_registration_wins() {
        let (notifier, mut reg) = recorded();
        assert!(reg.field("all", "hp_max", 42, FieldOptions::default()));
        assert!(!reg.field("ALL", "hp_max", 7, FieldOptions::default()));
        assert_eq!(reg.fields.value_or("a.pdf", "hp_max", 0), Scalar::Integer(42));
        assert!(notifier.contains(Severity::Warn, "already been defined"));
    }

    #[test]
    fn exact_file_beats_all() {
        let (_, mut reg) = recorded();
        reg.field("all", "name", "Generic", FieldOptions::default());
        reg.field("b.pdf", "name", "Specific", FieldOptions::default());
        assert_eq!(reg.fields.value_or("B.PDF", "name", ""), Scalar::from("Specific"));
        assert_eq!(reg.fields.value_or("a.pdf", "name", ""), Scalar::from("Generic"));
        assert!(!reg.fields.exists("a.pdf", "other"));
        assert_eq!(reg.fields.value_or("a.pdf", "other", "none"), Scalar::from("none"));
    }

    #[test]
    fn field_parse_fn_runs_on_resolve() {
        let (_, mut reg) = recorded();
        reg.field(
            "all",
            "speed",
            25,
            FieldOptions::parse_value(|v, _| Scalar::Text(format!("{v} ft"))),
        );
        assert_eq!(reg.fields.value_or("a.pdf", "speed", ""), Scalar::from("25 ft"));
    }

    #[test]
    fn invalid_entries_are_dropped_with_an_error() {
        let (notifier, mut reg) = recorded();
        assert!(!reg.field("", "x", 1, FieldOptions::default()));
        assert!(!reg.text_box("r", "all", 0, 1.5, 0.0, 0.1, 0.1, "text", &StyleOptions::new()));
        assert!(!reg.text_box("r", "all", 0, 0.0, 0.0, 0.1, f32::NAN, "text", &StyleOptions::new()));
        assert!(!reg.image("all", 0, 0.1, 0.1, "", None, None, ImageOptions::default()));
        assert!(!reg.text_box("r", "all", 0, 0.0, 0.0, 0.1, 0.1, "t", &StyleOptions::new().size(-1.0)));
        assert_eq!(notifier.count(Severity::Error), 5);
        assert!(reg.fields.is_empty());
        assert!(reg.text_boxes.is_empty());
        assert!(reg.images.is_empty());
    }

    #[test]
    fn invalid_default_color_is_rejected() {
        let (notifier, mut reg) = recorded();
        assert!(reg.default_font_color("#01579b"));
        assert!(!reg.default_font_color("#aééa"));
        assert!(!reg.default_font_color("blue"));
        assert_eq!(reg.defaults().color, [0x01, 0x57, 0x9b]);
        assert_eq!(notifier.count(Severity::Error), 2);
        assert!(notifier.contains(Severity::Error, "invalid default font color '#aééa'"));
    }

    #[test]
    fn blank_text_boxes_are_not_stored() {
        let (notifier, mut reg) = recorded();
        assert!(!reg.text_box("notes", "all", 0, 0.1, 0.1, 0.2, 0.2, "   ", &StyleOptions::new()));
        assert!(!reg.text_box("notes", "all", 0, 0.1, 0.1, 0.2, 0.2, Scalar::Empty, &StyleOptions::new()));
        assert!(reg.text_boxes.is_empty());
        assert_eq!(notifier.count(Severity::Error), 0);
    }

    #[test]
    fn text_box_value_parser_runs_at_registration() {
        let (_, mut reg) = recorded();
        let options = StyleOptions::new().value_parser(|v, ctx| Scalar::Text(format!("{}={v}", ctx.name)));
        reg.text_box("level", "a.pdf", 0, 0.1, 0.1, 0.2, 0.2, 3, &options);
        let stored = reg.text_boxes.resolve("a.pdf", "level").map(|b| b.text.clone());
        assert_eq!(stored.as_deref(), Some("level=3"));
    }

    #[test]
    fn text_boxes_pick_up_defaults_and_options() {
        let (_, mut reg) = recorded();
        assert!(reg.default_font("MarkerFelt.ttf", 12.0 / 792.0, Some(12.0 / 792.0)));
        assert!(reg.default_font_color("#01579b"));
        let centered = StyleOptions::new().halign(HAlign::Center).valign(VAlign::Top);
        reg.text_box("ac", "all", 0, 0.1, 0.2, 0.05, 0.02, 18, &centered);

        let b = reg.text_boxes.resolve("x.pdf", "ac").cloned();
        let Some(b) = b else {
            panic!("text box not registered");
        };
        assert_eq!(b.text, "18");
        assert_eq!(b.style.font_file, "MarkerFelt.ttf");
        assert_eq!(b.style.color, [0x01, 0x57, 0x9b]);
        assert_eq!(b.style.halign, HAlign::Center);
        assert_eq!(b.style.line_height, Some(12.0 / 792.0));
    }

    #[test]
    fn shared_references_and_specificity() {
        let (_, mut reg) = recorded();
        reg.text_box("ac", "all", 0, 0.1, 0.1, 0.1, 0.1, "generic", &StyleOptions::new());
        reg.text_box("ac", "all", 0, 0.2, 0.1, 0.1, 0.1, "second", &StyleOptions::new());
        reg.text_box("ac", "b.pdf", 0, 0.3, 0.1, 0.1, 0.1, "specific", &StyleOptions::new());
        assert_eq!(reg.text_boxes.len(), 3);
        assert_eq!(reg.text_boxes.resolve("b.pdf", "ac").map(|b| b.text.as_str()), Some("specific"));
        assert_eq!(reg.text_boxes.resolve("a.pdf", "ac").map(|b| b.text.as_str()), Some("generic"));
        assert_eq!(reg.text_boxes.for_file("a.pdf").count(), 2);
        assert_eq!(reg.text_boxes.for_file("b.pdf").count(), 3);
    }

    #[test]
    fn images_are_keyed_by_position() {
        let (notifier, mut reg) = recorded();
        assert!(reg.image("all", 2, 0.05, 0.05, "portrait.png", Some(0.3), Some(-1.0), ImageOptions::default()));
        assert!(!reg.image("a.pdf", 2, 0.05, 0.05, "other.png", None, None, ImageOptions::default()));
        assert!(reg.image("a.pdf", 1, 0.05, 0.05, "other.png", None, None, ImageOptions::default()));
        assert_eq!(notifier.count(Severity::Warn), 1);

        let Some(first) = reg.images.resolve(2, 0.05, 0.05) else {
            panic!("image missing");
        };
        assert_eq!(first.path, "portrait.png");
        assert_eq!(first.max_height, None);
        assert_eq!(reg.images.for_file("b.pdf").count(), 1);
        assert_eq!(reg.images.for_file("A.PDF").count(), 2);
    }
}
