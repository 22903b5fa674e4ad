//! One render: template bytes in, filled PDF bytes out.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use lopdf::{Document, ObjectId};
use pdf_writer::{Content, Name, Str};

use crate::error::Error;
use crate::fonts::{FontCache, FontSources, shared_font_dir, to_winansi_bytes};
use crate::forms::{self, WidgetKind};
use crate::geometry::PointRect;
use crate::images;
use crate::layout::{LayoutStyle, layout};
use crate::model::{TextBoxPlacement, file_name_of};
use crate::notify::{Notifier, Severity};
use crate::pdf;
use crate::registry::Registries;
use crate::resource::{FilesystemResourceProvider, ResourceProvider};

const DEBUG_STROKE: [f32; 3] = [1.0, 0.0, 0.0];
const IMAGE_RESOURCE_PREFIX: &str = "SfIm";

/// Directories a [`DocumentAssembler`] reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Fonts that belong to the sheet provider, searched first.
    pub provider_fonts: PathBuf,
    pub shared_fonts: PathBuf,
    /// Base directory for image paths.
    pub assets: PathBuf,
}

impl AssemblerConfig {
    /// The shared font directory comes from `SHEETFILL_FONTS` (or `./fonts`).
    pub fn new(provider_fonts: impl Into<PathBuf>, assets: impl Into<PathBuf>) -> Self {
        Self {
            provider_fonts: provider_fonts.into(),
            shared_fonts: shared_font_dir(),
            assets: assets.into(),
        }
    }

    pub fn with_shared_fonts(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shared_fonts = dir.into();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RenderStage {
    Unrendered,
    FieldsApplied,
    ImagesApplied,
    TextBoxesApplied,
    Serialized,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RenderStage::Unrendered => "unrendered",
            RenderStage::FieldsApplied => "fields applied",
            RenderStage::ImagesApplied => "images applied",
            RenderStage::TextBoxesApplied => "text boxes applied",
            RenderStage::Serialized => "serialized",
        };
        f.write_str(s)
    }
}

/// Renders templates against a set of registries. Holds no per-render
/// state, so one assembler can serve any number of renders and threads.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    fonts: FontSources,
    assets: Arc<dyn ResourceProvider>,
}

impl DocumentAssembler {
    pub fn new(fonts: FontSources, assets: Arc<dyn ResourceProvider>) -> Self {
        Self { fonts, assets }
    }

    pub fn from_config(config: &AssemblerConfig) -> Self {
        Self::new(
            FontSources::from_dirs(&config.provider_fonts, &config.shared_fonts),
            Arc::new(FilesystemResourceProvider::new(&config.assets)),
        )
    }

    /// Fills `template` with every registration that applies to `filename`
    /// (a bare name, a path or a URI; only the last segment is matched).
    ///
    /// Missing fonts and unreadable templates abort the render. Everything
    /// else that goes wrong is reported through the registries' notifier
    /// and skipped.
    pub fn render(&self, template: &[u8], filename: &str, registries: &Registries) -> Result<Vec<u8>, Error> {
        let filename = file_name_of(filename);
        let result = self.render_inner(template, filename, registries);
        if let Err(e) = &result {
            registries
                .notifier()
                .notify(Severity::Error, &format!("Rendering {filename} failed: {e}"));
        }
        result
    }

    fn render_inner(&self, template: &[u8], filename: &str, registries: &Registries) -> Result<Vec<u8>, Error> {
        let doc = pdf::load_template(template)?;
        let mut pass = RenderPass {
            pages: pdf::page_ids(&doc),
            names: pdf::ResourceNames::scan(&doc),
            doc,
            filename,
            registries,
            notifier: registries.notifier().as_ref(),
            fonts: FontCache::new(&self.fonts),
            assets: self.assets.as_ref(),
            overlays: BTreeMap::new(),
            images_placed: 0,
            stage: RenderStage::Unrendered,
        };
        pass.apply_fields()?;
        pass.apply_images()?;
        pass.apply_text_boxes()?;
        pass.finish()
    }
}

struct RenderPass<'a> {
    doc: Document,
    filename: &'a str,
    registries: &'a Registries,
    notifier: &'a dyn Notifier,
    fonts: FontCache<'a>,
    assets: &'a dyn ResourceProvider,
    pages: Vec<ObjectId>,
    names: pdf::ResourceNames,
    overlays: BTreeMap<usize, Content>,
    images_placed: usize,
    stage: RenderStage,
}

impl RenderPass<'_> {
    fn advance(&mut self, stage: RenderStage) {
        log::debug!("{}: {} -> {}", self.filename, self.stage, stage);
        self.stage = stage;
    }

    fn warn(&self, message: &str) {
        self.notifier.notify(Severity::Warn, message);
    }

    fn overlay(&mut self, page: usize) -> &mut Content {
        self.overlays.entry(page).or_insert_with(Content::new)
    }

    fn apply_fields(&mut self) -> Result<(), Error> {
        let widgets = forms::collect_widgets(&self.doc);
        let mut filled = 0usize;
        for widget in &widgets {
            let Some(entry) = self.registries.fields.resolve(self.filename, &widget.name) else {
                continue;
            };
            match &widget.kind {
                WidgetKind::Text => {
                    let value = entry.resolve(self.filename).to_text();
                    forms::set_text(&mut self.doc, widget, &value)?;
                    filled += 1;
                }
                WidgetKind::Checkbox => {
                    let checked = entry.resolve(self.filename).is_truthy();
                    forms::set_checked(&mut self.doc, widget, checked)?;
                    filled += 1;
                }
                WidgetKind::Other(kind) => {
                    self.warn(&format!(
                        "Field {} in {} is a {kind} widget, which cannot be filled",
                        widget.name, self.filename
                    ));
                }
            }
        }
        if filled > 0 {
            forms::enable_need_appearances(&mut self.doc)?;
        }
        log::debug!("{}: filled {filled} of {} form fields", self.filename, widgets.len());
        self.advance(RenderStage::FieldsApplied);
        Ok(())
    }

    fn apply_images(&mut self) -> Result<(), Error> {
        let registries = self.registries;
        for placement in registries.images.for_file(self.filename) {
            let Some(&page_id) = self.pages.get(placement.page) else {
                self.warn(&format!(
                    "An image was requested for page {}, but {} has only {} pages: {}",
                    placement.page,
                    self.filename,
                    self.pages.len(),
                    placement.path
                ));
                continue;
            };
            let data = match self.assets.load(&placement.path) {
                Ok(data) => data,
                Err(e) => {
                    self.warn(&format!("Could not load image {}: {e}", placement.path));
                    continue;
                }
            };
            let embedded = match images::embed_image(&mut self.doc, &data) {
                Ok(embedded) => embedded,
                Err(e) => {
                    self.warn(&format!("Skipping image {}: {e}", placement.path));
                    continue;
                }
            };

            let geometry = pdf::page_geometry(&self.doc, page_id);
            let scale = images::fit_scale(
                embedded.width_px,
                embedded.height_px,
                placement.max_width.map(|m| geometry.horizontal(m as f64)),
                placement.max_height.map(|m| geometry.vertical(m as f64)),
            );
            let width = embedded.width_px as f64 * scale;
            let height = embedded.height_px as f64 * scale;
            let rect = PointRect {
                x: geometry.origin_x + geometry.horizontal(placement.x as f64),
                y: geometry.origin_y + geometry.height - geometry.vertical(placement.y as f64) - height,
                width,
                height,
            };

            self.images_placed += 1;
            let name = self.names.next(IMAGE_RESOURCE_PREFIX);
            pdf::ensure_page_resource(&mut self.doc, page_id, "XObject", &name, embedded.id)?;
            let content = self.overlay(placement.page);
            content.save_state();
            content.transform([
                rect.width as f32,
                0.0,
                0.0,
                rect.height as f32,
                rect.x as f32,
                rect.y as f32,
            ]);
            content.x_object(Name(name.as_bytes()));
            content.restore_state();
            if placement.options.debug {
                stroke_debug_rect(content, &rect);
            }
        }
        self.advance(RenderStage::ImagesApplied);
        Ok(())
    }

    fn apply_text_boxes(&mut self) -> Result<(), Error> {
        let registries = self.registries;
        for placement in registries.text_boxes.for_file(self.filename) {
            let Some(&page_id) = self.pages.get(placement.page) else {
                self.warn(&format!(
                    "Text box {} was requested for page {}, but {} has only {} pages",
                    placement.reference,
                    placement.page,
                    self.filename,
                    self.pages.len()
                ));
                continue;
            };
            self.draw_text_box(page_id, placement)?;
        }
        self.advance(RenderStage::TextBoxesApplied);
        Ok(())
    }

    fn draw_text_box(&mut self, page_id: ObjectId, placement: &TextBoxPlacement) -> Result<(), Error> {
        let font = self
            .fonts
            .embed(&mut self.doc, &mut self.names, &placement.style.font_file)?;
        pdf::ensure_page_resource(&mut self.doc, page_id, "Font", &font.resource_name, font.font_id)?;

        let geometry = pdf::page_geometry(&self.doc, page_id);
        let rect = geometry.to_points(
            placement.x as f64,
            placement.y as f64,
            placement.width as f64,
            placement.height as f64,
        );
        let style = LayoutStyle::resolve(&placement.style, &geometry, &font.metrics);
        let laid = layout(&rect, &style, &placement.text, &font.metrics);
        if let Some(dropped) = &laid.dropped_text {
            self.notifier.notify(
                Severity::Debug,
                &format!(
                    "Text box {} overflows by {:.1}pt, not drawn: {dropped}",
                    placement.reference, laid.dropped_width
                ),
            );
        }

        let [r, g, b] = placement.style.color;
        let content = self.overlay(placement.page);
        if placement.style.debug {
            stroke_debug_rect(content, &rect);
        }
        for line in laid.lines.iter().filter(|l| !l.text.trim().is_empty()) {
            let bytes = to_winansi_bytes(&line.text);
            content.save_state();
            content.set_fill_rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
            content
                .begin_text()
                .set_font(Name(font.resource_name.as_bytes()), style.size as f32)
                .next_line(line.x as f32, line.y as f32)
                .show(Str(&bytes))
                .end_text();
            content.restore_state();
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, Error> {
        let overlays = std::mem::take(&mut self.overlays);
        for (page, content) in overlays {
            let Some(&page_id) = self.pages.get(page) else {
                continue;
            };
            let raw = content.finish();
            pdf::append_content(&mut self.doc, page_id, &raw)?;
        }
        let out = pdf::serialize(&mut self.doc)?;
        log::debug!(
            "{}: {} fonts embedded, {} images placed, {} bytes",
            self.filename,
            self.fonts.len(),
            self.images_placed,
            out.len()
        );
        self.advance(RenderStage::Serialized);
        Ok(out)
    }
}

fn stroke_debug_rect(content: &mut Content, rect: &PointRect) {
    content.save_state();
    content.set_line_width(0.5);
    content.set_stroke_rgb(DEBUG_STROKE[0], DEBUG_STROKE[1], DEBUG_STROKE[2]);
    content.rect(rect.x as f32, rect.y as f32, rect.width as f32, rect.height as f32);
    content.stroke();
    content.restore_state();
}
