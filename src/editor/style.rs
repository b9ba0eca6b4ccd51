use serde::{Deserialize, Serialize};

use crate::geometry::Color;

pub const MIN_FONT_SIZE: u16 = 6;
pub const MAX_FONT_SIZE: u16 = 400;
pub const MAX_STROKE_WIDTH: u8 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    Impact,
    Sans,
    Serif,
    Monospace,
}

impl FontFamily {
    pub const fn cairo_font_name(self) -> &'static str {
        match self {
            Self::Impact => "Impact",
            Self::Sans => "Sans",
            Self::Serif => "Serif",
            Self::Monospace => "Monospace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSlant {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Per-box text appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: u16,
    pub font_family: FontFamily,
    pub weight: FontWeight,
    pub slant: FontSlant,
    pub color: Color,
    pub stroke_color: Color,
    pub stroke_width: u8,
    pub align: TextAlign,
    /// Percent, `None` means fully opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<u8>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 40,
            font_family: FontFamily::Impact,
            weight: FontWeight::Bold,
            slant: FontSlant::Normal,
            color: Color::WHITE,
            stroke_color: Color::BLACK,
            stroke_width: 2,
            align: TextAlign::Center,
            opacity: None,
        }
    }
}

impl TextStyle {
    pub fn set_font_size(&mut self, size: u16) {
        self.font_size = size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
    }

    pub fn set_stroke_width(&mut self, width: u8) {
        self.stroke_width = width.min(MAX_STROKE_WIDTH);
    }

    pub fn set_opacity(&mut self, opacity: u8) {
        self.opacity = Some(opacity.min(100));
    }

    pub fn alpha(&self) -> f64 {
        f64::from(self.opacity.unwrap_or(100).min(100)) / 100.0
    }

    /// Applies every field set in `patch` and reports whether anything changed.
    pub fn apply(&mut self, patch: &StylePatch) -> bool {
        let before = *self;
        if let Some(size) = patch.font_size {
            self.set_font_size(size);
        }
        if let Some(family) = patch.font_family {
            self.font_family = family;
        }
        if let Some(weight) = patch.weight {
            self.weight = weight;
        }
        if let Some(slant) = patch.slant {
            self.slant = slant;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(stroke_color) = patch.stroke_color {
            self.stroke_color = stroke_color;
        }
        if let Some(width) = patch.stroke_width {
            self.set_stroke_width(width);
        }
        if let Some(align) = patch.align {
            self.align = align;
        }
        if let Some(opacity) = patch.opacity {
            self.set_opacity(opacity);
        }
        *self != before
    }
}

/// Partial style update pushed by external style controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StylePatch {
    pub font_size: Option<u16>,
    pub font_family: Option<FontFamily>,
    pub weight: Option<FontWeight>,
    pub slant: Option<FontSlant>,
    pub color: Option<Color>,
    pub stroke_color: Option<Color>,
    pub stroke_width: Option<u8>,
    pub align: Option<TextAlign>,
    pub opacity: Option<u8>,
}

impl StylePatch {
    pub fn color(color: Color) -> Self {
        Self {
            color: Some(color),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_style_is_classic_meme_text() {
        let style = TextStyle::default();
        assert_eq!(style.font_family, FontFamily::Impact);
        assert_eq!(style.color, Color::WHITE);
        assert_eq!(style.stroke_color, Color::BLACK);
        assert_eq!(style.align, TextAlign::Center);
        assert_eq!(style.alpha(), 1.0);
    }

    #[test]
    fn apply_patch_updates_only_set_fields_and_reports_change() {
        let mut style = TextStyle::default();
        assert!(style.apply(&StylePatch::color(Color::new(255, 0, 0))));
        assert_eq!(style.color, Color::new(255, 0, 0));
        assert_eq!(style.font_size, 40);

        assert!(!style.apply(&StylePatch::color(Color::new(255, 0, 0))));
        assert!(!style.apply(&StylePatch::default()));
    }

    #[test]
    fn apply_patch_clamps_numeric_fields() {
        let mut style = TextStyle::default();
        style.apply(&StylePatch {
            font_size: Some(0),
            stroke_width: Some(200),
            opacity: Some(150),
            ..StylePatch::default()
        });
        assert_eq!(style.font_size, MIN_FONT_SIZE);
        assert_eq!(style.stroke_width, MAX_STROKE_WIDTH);
        assert_eq!(style.opacity, Some(100));
    }

    #[test]
    fn style_patch_deserializes_from_partial_json() {
        let patch: StylePatch =
            serde_json::from_str(r##"{"color":"#FF0000","align":"left"}"##).unwrap();
        assert_eq!(patch.color, Some(Color::new(255, 0, 0)));
        assert_eq!(patch.align, Some(TextAlign::Left));
        assert_eq!(patch.font_size, None);
        assert!(!patch.is_empty());
    }
}
