//! Registration in logical pixels of a fixed page size, for sheet
//! mappings measured off a page image rather than in page fractions.

use crate::model::{FieldOptions, ImageOptions, StyleOptions, Value};
use crate::registry::Registries;

pub struct PixelSheet<'a> {
    registries: &'a mut Registries,
    width: f32,
    height: f32,
}

impl<'a> PixelSheet<'a> {
    pub fn new(registries: &'a mut Registries, width: f32, height: f32) -> Self {
        Self {
            registries,
            width,
            height,
        }
    }

    /// US Letter at 72 dpi.
    pub fn letter(registries: &'a mut Registries) -> Self {
        Self::new(registries, 612.0, 792.0)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// A font size or line height in pixels as a fraction of the page height.
    pub fn size(&self, px: f32) -> f32 {
        px / self.height
    }

    /// Style with the given size and line height in pixels.
    pub fn font(&self, size_px: f32, line_height_px: f32) -> StyleOptions {
        StyleOptions::new()
            .size(self.size(size_px))
            .line_height(self.size(line_height_px))
    }

    pub fn default_font(&mut self, font_file: &str, size_px: f32, line_height_px: Option<f32>) -> bool {
        let size = self.size(size_px);
        let line_height = line_height_px.map(|lh| self.size(lh));
        self.registries.default_font(font_file, size, line_height)
    }

    pub fn default_font_color(&mut self, hex: &str) -> bool {
        self.registries.default_font_color(hex)
    }

    pub fn field(&mut self, file: &str, name: &str, value: impl Into<Value>, options: FieldOptions) -> bool {
        self.registries.field(file, name, value, options)
    }

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
        self.registries.text_box(
            reference,
            file,
            page,
            x / self.width,
            y / self.height,
            width / self.width,
            height / self.height,
            text,
            options,
        )
    }

    /// Non-positive maxima stay disabled.
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
        self.registries.image(
            file,
            page,
            x / self.width,
            y / self.height,
            path,
            max_width.filter(|m| *m > 0.0).map(|m| m / self.width),
            max_height.filter(|m| *m > 0.0).map(|m| m / self.height),
            options,
        )
    }
}

/// The mark drawn into checkbox-like text boxes.
pub fn check_mark(value: bool) -> &'static str {
    if value { "x" } else { "" }
}
