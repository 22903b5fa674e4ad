use std::fmt;
use std::sync::Arc;

/// File selector that matches every template.
pub const ALL_FILES: &str = "all";

/// A literal value as it ends up in a widget or a text box.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Scalar {
    #[default]
    Empty,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Checkbox coercion.
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Empty => false,
            Scalar::Bool(b) => *b,
            Scalar::Integer(i) => *i != 0,
            Scalar::Number(n) => *n != 0.0 && !n.is_nan(),
            Scalar::Text(s) => {
                let s = s.trim().to_ascii_lowercase();
                !matches!(s.as_str(), "" | "0" | "false" | "off" | "no")
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Scalar::Empty => true,
            Scalar::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Empty => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! scalar_from {
    ($($t:ty => $variant:ident as $conv:ty),* $(,)?) => {
        $(
            impl From<$t> for Scalar {
                fn from(v: $t) -> Self {
                    Scalar::$variant(v as $conv)
                }
            }

            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Literal(Scalar::from(v))
                }
            }
        )*
    };
}

scalar_from!(
    i32 => Integer as i64,
    i64 => Integer as i64,
    u32 => Integer as i64,
    usize => Integer as i64,
    f32 => Number as f64,
    f64 => Number as f64,
);

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Empty)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Literal(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Literal(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Literal(v.into())
    }
}

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Value::Literal(v)
    }
}

/// What a parser or deferred value is being resolved for.
#[derive(Clone, Copy, Debug)]
pub struct ParseContext<'a> {
    pub file: &'a str,
    /// Field name, or text-box reference.
    pub name: &'a str,
}

pub type ValueParser = Arc<dyn Fn(Scalar, &ParseContext<'_>) -> Scalar + Send + Sync>;
pub type DeferredValue = Arc<dyn Fn() -> Scalar + Send + Sync>;

#[derive(Clone)]
pub enum Value {
    Literal(Scalar),
    /// Computed when the value is first needed.
    Deferred(DeferredValue),
    Parsed(Scalar, ValueParser),
}

impl Value {
    pub fn literal(v: impl Into<Scalar>) -> Self {
        Value::Literal(v.into())
    }

    pub fn deferred(f: impl Fn() -> Scalar + Send + Sync + 'static) -> Self {
        Value::Deferred(Arc::new(f))
    }

    pub fn parsed(
        v: impl Into<Scalar>,
        parser: impl Fn(Scalar, &ParseContext<'_>) -> Scalar + Send + Sync + 'static,
    ) -> Self {
        Value::Parsed(v.into(), Arc::new(parser))
    }

    pub fn resolve(&self, ctx: &ParseContext<'_>) -> Scalar {
        match self {
            Value::Literal(v) => v.clone(),
            Value::Deferred(f) => f(),
            Value::Parsed(v, parser) => parser(v.clone(), ctx),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Value::Deferred(_) => f.write_str("Deferred(..)"),
            Value::Parsed(v, _) => f.debug_tuple("Parsed").field(v).finish(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    #[default]
    Bottom,
}

pub fn parse_halign(val: &str) -> Option<HAlign> {
    match val.trim().to_ascii_lowercase().as_str() {
        "left" => Some(HAlign::Left),
        "center" | "centre" => Some(HAlign::Center),
        "right" => Some(HAlign::Right),
        _ => None,
    }
}

pub fn parse_valign(val: &str) -> Option<VAlign> {
    match val.trim().to_ascii_lowercase().as_str() {
        "top" => Some(VAlign::Top),
        "middle" | "center" => Some(VAlign::Middle),
        "bottom" => Some(VAlign::Bottom),
        _ => None,
    }
}

/// Accepts `#rrggbb`, `rrggbb` and `#rgb`.
pub fn parse_hex_color(val: &str) -> Option<[u8; 3]> {
    let val = val.trim().trim_start_matches('#');
    if !val.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match val.len() {
        6 => {
            let r = u8::from_str_radix(&val[0..2], 16).ok()?;
            let g = u8::from_str_radix(&val[2..4], 16).ok()?;
            let b = u8::from_str_radix(&val[4..6], 16).ok()?;
            Some([r, g, b])
        }
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in val.chars().enumerate() {
                let d = c.to_digit(16)? as u8;
                rgb[i] = d * 17;
            }
            Some(rgb)
        }
        _ => None,
    }
}

/// Registry-wide font settings every text box starts from.
#[derive(Clone, Debug, PartialEq)]
pub struct FontDefaults {
    pub font_file: String,
    /// Fraction of page height.
    pub size: f32,
    pub line_height: Option<f32>,
    pub color: [u8; 3],
}

impl Default for FontDefaults {
    fn default() -> Self {
        Self {
            font_file: "DejaVuSans.ttf".to_string(),
            size: 12.0 / 792.0,
            line_height: None,
            color: [0, 0, 0],
        }
    }
}

/// A fully resolved, immutable text style.
#[derive(Clone)]
pub struct TextStyle {
    pub font_file: String,
    /// Fraction of page height.
    pub size: f32,
    /// Fraction of page height; `None` uses the font's own line spacing.
    pub line_height: Option<f32>,
    pub color: [u8; 3],
    pub halign: HAlign,
    pub valign: VAlign,
    pub multiline: bool,
    pub overflow: bool,
    pub prefix: String,
    pub suffix: String,
    pub debug: bool,
    pub value_parser: Option<ValueParser>,
}

impl TextStyle {
    pub fn from_defaults(defaults: &FontDefaults) -> Self {
        Self {
            font_file: defaults.font_file.clone(),
            size: defaults.size,
            line_height: defaults.line_height,
            color: defaults.color,
            halign: HAlign::default(),
            valign: VAlign::default(),
            multiline: false,
            overflow: false,
            prefix: String::new(),
            suffix: String::new(),
            debug: false,
            value_parser: None,
        }
    }

    /// Applies every field `options` sets, leaving the rest untouched.
    pub fn with_options(&self, options: &StyleOptions) -> Self {
        let mut style = self.clone();
        if let Some(v) = &options.font_file {
            style.font_file = v.clone();
        }
        if let Some(v) = options.size {
            style.size = v;
        }
        if let Some(v) = options.line_height {
            style.line_height = Some(v);
        }
        if let Some(v) = options.color {
            style.color = v;
        }
        if let Some(v) = options.halign {
            style.halign = v;
        }
        if let Some(v) = options.valign {
            style.valign = v;
        }
        if let Some(v) = options.multiline {
            style.multiline = v;
        }
        if let Some(v) = options.overflow {
            style.overflow = v;
        }
        if let Some(v) = &options.prefix {
            style.prefix = v.clone();
        }
        if let Some(v) = &options.suffix {
            style.suffix = v.clone();
        }
        if let Some(v) = options.debug {
            style.debug = v;
        }
        if let Some(v) = &options.value_parser {
            style.value_parser = Some(v.clone());
        }
        style
    }
}

impl fmt::Debug for TextStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextStyle")
            .field("font_file", &self.font_file)
            .field("size", &self.size)
            .field("line_height", &self.line_height)
            .field("color", &self.color)
            .field("halign", &self.halign)
            .field("valign", &self.valign)
            .field("multiline", &self.multiline)
            .field("overflow", &self.overflow)
            .field("prefix", &self.prefix)
            .field("suffix", &self.suffix)
            .field("debug", &self.debug)
            .field("value_parser", &self.value_parser.is_some())
            .finish()
    }
}

/// A partial style. Presets are built once and combined with [`StyleOptions::merge`].
#[derive(Clone, Default)]
pub struct StyleOptions {
    pub font_file: Option<String>,
    pub size: Option<f32>,
    pub line_height: Option<f32>,
    pub color: Option<[u8; 3]>,
    pub halign: Option<HAlign>,
    pub valign: Option<VAlign>,
    pub multiline: Option<bool>,
    pub overflow: Option<bool>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub debug: Option<bool>,
    pub value_parser: Option<ValueParser>,
}

impl StyleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field-by-field combination; values set in `other` win.
    pub fn merge(&self, other: &StyleOptions) -> Self {
        Self {
            font_file: other.font_file.clone().or_else(|| self.font_file.clone()),
            size: other.size.or(self.size),
            line_height: other.line_height.or(self.line_height),
            color: other.color.or(self.color),
            halign: other.halign.or(self.halign),
            valign: other.valign.or(self.valign),
            multiline: other.multiline.or(self.multiline),
            overflow: other.overflow.or(self.overflow),
            prefix: other.prefix.clone().or_else(|| self.prefix.clone()),
            suffix: other.suffix.clone().or_else(|| self.suffix.clone()),
            debug: other.debug.or(self.debug),
            value_parser: other
                .value_parser
                .clone()
                .or_else(|| self.value_parser.clone()),
        }
    }

    pub fn font_file(mut self, v: impl Into<String>) -> Self {
        self.font_file = Some(v.into());
        self
    }

    pub fn size(mut self, v: f32) -> Self {
        self.size = Some(v);
        self
    }

    pub fn line_height(mut self, v: f32) -> Self {
        self.line_height = Some(v);
        self
    }

    /// A color that does not parse is logged and leaves the color unset.
    pub fn color(mut self, hex: &str) -> Self {
        match parse_hex_color(hex) {
            Some(rgb) => self.color = Some(rgb),
            None => log::warn!("Ignoring invalid style color '{hex}'"),
        }
        self
    }

    pub fn halign(mut self, v: HAlign) -> Self {
        self.halign = Some(v);
        self
    }

    pub fn valign(mut self, v: VAlign) -> Self {
        self.valign = Some(v);
        self
    }

    pub fn multiline(mut self, v: bool) -> Self {
        self.multiline = Some(v);
        self
    }

    pub fn overflow(mut self, v: bool) -> Self {
        self.overflow = Some(v);
        self
    }

    pub fn prefix(mut self, v: impl Into<String>) -> Self {
        self.prefix = Some(v.into());
        self
    }

    pub fn suffix(mut self, v: impl Into<String>) -> Self {
        self.suffix = Some(v.into());
        self
    }

    pub fn debug(mut self, v: bool) -> Self {
        self.debug = Some(v);
        self
    }

    pub fn value_parser(
        mut self,
        f: impl Fn(Scalar, &ParseContext<'_>) -> Scalar + Send + Sync + 'static,
    ) -> Self {
        self.value_parser = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for StyleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleOptions")
            .field("font_file", &self.font_file)
            .field("size", &self.size)
            .field("line_height", &self.line_height)
            .field("color", &self.color)
            .field("halign", &self.halign)
            .field("valign", &self.valign)
            .field("multiline", &self.multiline)
            .field("overflow", &self.overflow)
            .field("prefix", &self.prefix)
            .field("suffix", &self.suffix)
            .field("debug", &self.debug)
            .field("value_parser", &self.value_parser.is_some())
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct FieldOptions {
    pub parse_value: Option<ValueParser>,
}

impl FieldOptions {
    pub fn parse_value(
        f: impl Fn(Scalar, &ParseContext<'_>) -> Scalar + Send + Sync + 'static,
    ) -> Self {
        Self {
            parse_value: Some(Arc::new(f)),
        }
    }
}

#[derive(Clone)]
pub struct FieldAssignment {
    pub file: String,
    pub name: String,
    pub value: Value,
    pub parse_fn: Option<ValueParser>,
}

impl FieldAssignment {
    pub fn resolve(&self, file: &str) -> Scalar {
        let ctx = ParseContext {
            file,
            name: &self.name,
        };
        let value = self.value.resolve(&ctx);
        match &self.parse_fn {
            Some(parse) => parse(value, &ctx),
            None => value,
        }
    }
}

impl fmt::Debug for FieldAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAssignment")
            .field("file", &self.file)
            .field("name", &self.name)
            .field("value", &self.value)
            .field("parse_fn", &self.parse_fn.is_some())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImageOptions {
    /// Stroke the placed image rectangle.
    pub debug: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImagePlacement {
    pub file: String,
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub path: String,
    /// Fraction of page width; `None` leaves the width unconstrained.
    pub max_width: Option<f32>,
    /// Fraction of page height.
    pub max_height: Option<f32>,
    pub options: ImageOptions,
}

#[derive(Clone, Debug)]
pub struct TextBoxPlacement {
    pub reference: String,
    pub file: String,
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub text: String,
    pub style: TextStyle,
}

/// True when an entry registered for `entry_file` applies to `filename`.
pub fn file_matches(entry_file: &str, filename: &str) -> bool {
    entry_file.eq_ignore_ascii_case(ALL_FILES) || entry_file.eq_ignore_ascii_case(filename)
}

/// Last `/`-separated segment of a path or URI.
pub fn file_name_of(uri: &str) -> &str {
    uri.rsplit(['/', '\\']).next().unwrap_or(uri)
}
