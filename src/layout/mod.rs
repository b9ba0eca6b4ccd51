//! Text wrapping and block placement for text boxes.
//!
//! Everything here is pure: callers inject the width measurement so the same
//! code runs against cairo font metrics in the compositor and against stub
//! measurers in tests.

use crate::editor::TextAlign;
use crate::geometry::BoxBounds;

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f64 = 1.2;

pub fn line_height_for(font_size: u16) -> f64 {
    (f64::from(font_size.max(1)) * LINE_HEIGHT_FACTOR).max(2.0)
}

/// Wraps `text` into lines no wider than `max_width` according to `measure`.
///
/// Hard line breaks split the text into paragraphs that wrap independently.
pub fn wrap_text(text: &str, max_width: f64, mut measure: impl FnMut(&str) -> f64) -> Vec<String> {
    if text.contains('\n') {
        return text
            .split('\n')
            .flat_map(|paragraph| wrap_paragraph(paragraph, max_width, &mut measure))
            .collect();
    }
    wrap_paragraph(text, max_width, &mut measure)
}

fn wrap_paragraph(text: &str, max_width: f64, measure: &mut impl FnMut(&str) -> f64) -> Vec<String> {
    if measure(text) <= max_width {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = start_line_with_word(word, max_width, measure, &mut lines);
            continue;
        }

        let candidate = format!("{current} {word}");
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current = start_line_with_word(word, max_width, measure, &mut lines);
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Returns the open line after placing `word` at the start of a line, pushing
/// any full character-wrapped chunks onto `lines`.
fn start_line_with_word(
    word: &str,
    max_width: f64,
    measure: &mut impl FnMut(&str) -> f64,
    lines: &mut Vec<String>,
) -> String {
    if measure(word) <= max_width {
        return word.to_string();
    }

    let mut chunks = wrap_characters(word, max_width, measure);
    let last = chunks.pop().unwrap_or_default();
    lines.extend(chunks);
    last
}

fn wrap_characters(word: &str, max_width: f64, measure: &mut impl FnMut(&str) -> f64) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        let mut candidate = current.clone();
        candidate.push(ch);
        if current.is_empty() || measure(&candidate) <= max_width {
            current = candidate;
        } else {
            chunks.push(std::mem::replace(&mut current, ch.to_string()));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Where one wrapped line is painted, in surface coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePlacement {
    pub text: String,
    pub x: f64,
    pub baseline_y: f64,
}

/// Font metrics needed to place a block of lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockMetrics {
    pub line_height: f64,
    pub ascent: f64,
    pub descent: f64,
}

/// Places wrapped lines inside `bounds`, vertically centered on the box center.
///
/// `widths[i]` is the measured advance of `lines[i]`.
pub fn layout_block(
    lines: &[String],
    widths: &[f64],
    bounds: BoxBounds,
    align: TextAlign,
    metrics: BlockMetrics,
) -> Vec<LinePlacement> {
    let (_, center_y) = bounds.center();
    let block_height = lines.len() as f64 * metrics.line_height;
    let block_top = center_y - block_height / 2.0;
    // Center the glyph extents inside each line slot.
    let glyph_height = metrics.ascent + metrics.descent;
    let slot_padding = (metrics.line_height - glyph_height) / 2.0;
    let box_left = f64::from(bounds.x);
    let box_width = f64::from(bounds.width);

    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let width = widths.get(index).copied().unwrap_or(0.0);
            let x = match align {
                TextAlign::Left => box_left,
                TextAlign::Center => box_left + (box_width - width) / 2.0,
                TextAlign::Right => box_left + box_width - width,
            };
            LinePlacement {
                text: line.clone(),
                x,
                baseline_y: block_top
                    + index as f64 * metrics.line_height
                    + slot_padding
                    + metrics.ascent,
            }
        })
        .collect()
}
