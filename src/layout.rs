//! Text measurement and box layout.
//!
//! All lengths here are PDF points. Positions are baselines in PDF user
//! space (origin bottom-left), ready to be handed to a `Td` operator.

use crate::fonts::{FontMetrics, to_winansi_bytes};
use crate::geometry::{PageGeometry, PointRect};
use crate::model::{HAlign, TextStyle, VAlign};

const EPSILON: f64 = 1e-6;
const ELLIPSIS: &str = " ...";

/// Measures strings set in one font at one size.
#[derive(Clone, Copy, Debug)]
pub struct TextMeasurer<'a> {
    metrics: &'a FontMetrics,
    size: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Line {
    pub text: String,
    pub width: f64,
}

impl<'a> TextMeasurer<'a> {
    pub fn new(metrics: &'a FontMetrics, size: f64) -> Self {
        Self { metrics, size }
    }

    /// Characters without a WinAnsi slot measure as zero.
    pub fn width_of(&self, text: &str) -> f64 {
        let units: f64 = to_winansi_bytes(text)
            .into_iter()
            .map(|b| self.metrics.advance_1000(b) as f64)
            .sum();
        units / 1000.0 * self.size
    }

    /// Greedy word wrap. Explicit newlines always break; words wider than
    /// `max_width` are split between characters.
    pub fn wrap(&self, text: &str, max_width: f64) -> Vec<Line> {
        let mut out = Vec::new();
        for paragraph in text.split('\n') {
            let paragraph = paragraph.trim_end_matches('\r');
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{current} {word}")
                };
                if self.width_of(&candidate) <= max_width + EPSILON {
                    current = candidate;
                    continue;
                }
                if !current.is_empty() {
                    out.push(self.line(std::mem::take(&mut current)));
                }
                if self.width_of(word) <= max_width + EPSILON {
                    current = word.to_string();
                } else {
                    current = self.break_word(word, max_width, &mut out);
                }
            }
            out.push(self.line(current));
        }
        out
    }

    /// Pushes full chunks of `word` and returns the unfinished tail.
    fn break_word(&self, word: &str, max_width: f64, out: &mut Vec<Line>) -> String {
        let mut chunk = String::new();
        for ch in word.chars() {
            chunk.push(ch);
            if chunk.chars().count() > 1 && self.width_of(&chunk) > max_width + EPSILON {
                chunk.pop();
                out.push(self.line(std::mem::take(&mut chunk)));
                chunk.push(ch);
            }
        }
        chunk
    }

    fn line(&self, text: String) -> Line {
        let width = self.width_of(&text);
        Line { text, width }
    }
}

/// A [`TextStyle`] converted to points for one page.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutStyle {
    pub size: f64,
    pub line_height: f64,
    pub halign: HAlign,
    pub valign: VAlign,
    pub multiline: bool,
    pub overflow: bool,
    pub prefix: String,
    pub suffix: String,
}

impl LayoutStyle {
    /// Without an explicit line height the font's natural spacing is used.
    pub fn resolve(style: &TextStyle, page: &PageGeometry, metrics: &FontMetrics) -> Self {
        let size = page.vertical(style.size as f64);
        let line_height = match style.line_height {
            Some(lh) => page.vertical(lh as f64),
            None => metrics.line_h_ratio() as f64 * size,
        };
        Self {
            size,
            line_height,
            halign: style.halign,
            valign: style.valign,
            multiline: style.multiline,
            overflow: style.overflow,
            prefix: style.prefix.clone(),
            suffix: style.suffix.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f64,
    /// Baseline.
    pub y: f64,
    pub width: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<PlacedLine>,
    /// First (or only) line, kept for single-line callers.
    pub draw_text: String,
    pub draw_x: f64,
    pub draw_y: f64,
    pub used_width: f64,
    pub used_height: f64,
    pub truncated: bool,
    /// Multi-line text that did not fit, joined with single spaces.
    pub dropped_text: Option<String>,
    pub dropped_width: f64,
}

pub fn layout(rect: &PointRect, style: &LayoutStyle, raw: &str, metrics: &FontMetrics) -> TextLayout {
    let measurer = TextMeasurer::new(metrics, style.size);
    if style.multiline {
        layout_multiline(rect, style, raw, &measurer)
    } else {
        layout_single(rect, style, raw, &measurer)
    }
}

fn align_x(rect: &PointRect, halign: HAlign, width: f64) -> f64 {
    match halign {
        HAlign::Left => rect.x,
        HAlign::Center => rect.x + (rect.width - width) / 2.0,
        HAlign::Right => rect.x + rect.width - width,
    }
}

fn layout_single(rect: &PointRect, style: &LayoutStyle, raw: &str, measurer: &TextMeasurer) -> TextLayout {
    let full = format!("{}{raw}{}", style.prefix, style.suffix);
    let full_width = measurer.width_of(&full);

    let mut text = full.clone();
    let mut width = full_width;
    let mut truncated = false;
    if full_width > rect.width + EPSILON && !style.overflow {
        let mut chars: Vec<char> = raw.chars().collect();
        while chars.pop().is_some() && !chars.is_empty() {
            let head: String = chars.iter().collect();
            let candidate = format!("{}{head}{ELLIPSIS}{}", style.prefix, style.suffix);
            let candidate_width = measurer.width_of(&candidate);
            if candidate_width <= rect.width + EPSILON {
                text = candidate;
                width = candidate_width;
                truncated = true;
                break;
            }
        }
        if !truncated {
            log::debug!("No truncation of '{raw}' fits {:.1}pt, drawing it whole", rect.width);
        }
    }

    let x = align_x(rect, style.halign, width);
    let y = match style.valign {
        VAlign::Bottom => rect.y,
        VAlign::Top => rect.top() - style.line_height,
        VAlign::Middle => rect.y + (rect.height - style.line_height) / 2.0,
    };

    TextLayout {
        lines: vec![PlacedLine {
            text: text.clone(),
            x,
            y,
            width,
        }],
        draw_text: text,
        draw_x: x,
        draw_y: y,
        used_width: width,
        used_height: style.line_height,
        truncated,
        dropped_text: None,
        dropped_width: 0.0,
    }
}

fn layout_multiline(rect: &PointRect, style: &LayoutStyle, raw: &str, measurer: &TextMeasurer) -> TextLayout {
    let full = format!("{}{raw}{}", style.prefix, style.suffix);
    let mut lines = measurer.wrap(&full, rect.width);
    let lh = style.line_height;

    let fits = lh <= 0.0 || lines.len() as f64 * lh <= rect.height + EPSILON;
    let mut dropped_text = None;
    let mut dropped_width = 0.0;
    if !fits {
        let keep = ((rect.height + EPSILON) / lh).floor().max(0.0) as usize;
        let dropped: Vec<String> = lines.split_off(keep.min(lines.len())).into_iter().map(|l| l.text).collect();
        let joined = dropped.join(" ");
        dropped_width = measurer.width_of(&joined);
        dropped_text = Some(joined);
    }

    let kept = lines.len();
    let used_height = kept as f64 * lh;
    let block_top = match style.valign {
        VAlign::Top => rect.top(),
        VAlign::Bottom => rect.y + used_height,
        VAlign::Middle => rect.y + (rect.height + used_height) / 2.0,
    };

    let placed: Vec<PlacedLine> = lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| PlacedLine {
            x: align_x(rect, style.halign, line.width),
            y: block_top - (i + 1) as f64 * lh,
            width: line.width,
            text: line.text,
        })
        .collect();

    let used_width = placed.iter().map(|l| l.width).fold(0.0, f64::max);
    let (draw_text, draw_x, draw_y) = placed
        .first()
        .map(|l| (l.text.clone(), l.x, l.y))
        .unwrap_or((String::new(), rect.x, rect.y));

    TextLayout {
        lines: placed,
        draw_text,
        draw_x,
        draw_y,
        used_width,
        used_height,
        truncated: dropped_text.is_some(),
        dropped_text,
        dropped_width,
    }
}
