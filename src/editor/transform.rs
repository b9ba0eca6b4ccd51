use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 5.0;
pub const MAX_PHOTOMETRIC_PERCENT: u16 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    None,
    Grayscale,
    Sepia,
    Blur,
    Invert,
}

impl FilterKind {
    const fn css_fragment(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Grayscale => Some("grayscale(100%)"),
            Self::Sepia => Some("sepia(100%)"),
            Self::Blur => Some("blur(4px)"),
            Self::Invert => Some("invert(100%)"),
        }
    }
}

/// Whole-image transform applied before text is composited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageTransform {
    pub scale: f64,
    pub rotation_degrees: f64,
    pub brightness_pct: u16,
    pub contrast_pct: u16,
    #[serde(default)]
    pub filter: FilterKind,
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ImageTransform {
    pub const fn identity() -> Self {
        Self {
            scale: 1.0,
            rotation_degrees: 0.0,
            brightness_pct: 100,
            contrast_pct: 100,
            filter: FilterKind::None,
        }
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = if scale.is_finite() {
            scale.clamp(MIN_SCALE, MAX_SCALE)
        } else {
            1.0
        };
    }

    /// Normalized into `(-360, 360)`.
    pub fn set_rotation_degrees(&mut self, degrees: f64) {
        self.rotation_degrees = if degrees.is_finite() {
            degrees % 360.0
        } else {
            0.0
        };
    }

    pub fn set_brightness_pct(&mut self, pct: u16) {
        self.brightness_pct = pct.min(MAX_PHOTOMETRIC_PERCENT);
    }

    pub fn set_contrast_pct(&mut self, pct: u16) {
        self.contrast_pct = pct.min(MAX_PHOTOMETRIC_PERCENT);
    }

    pub fn set_filter(&mut self, filter: FilterKind) {
        self.filter = filter;
    }

    pub fn rotation_radians(&self) -> f64 {
        self.rotation_degrees.to_radians()
    }

    pub fn has_photometric_effect(&self) -> bool {
        self.brightness_pct != 100 || self.contrast_pct != 100 || self.filter != FilterKind::None
    }

    pub fn has_geometric_effect(&self) -> bool {
        self.scale != 1.0 || self.rotation_degrees != 0.0
    }

    /// CSS-style description of the combined photometric pass.
    pub fn filter_string(&self) -> String {
        let mut parts = vec![
            format!("brightness({}%)", self.brightness_pct),
            format!("contrast({}%)", self.contrast_pct),
        ];
        if let Some(fragment) = self.filter.css_fragment() {
            parts.push(fragment.to_string());
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_has_no_effects() {
        let transform = ImageTransform::identity();
        assert_eq!(transform, ImageTransform::identity());
        assert!(!transform.has_photometric_effect());
        assert!(!transform.has_geometric_effect());
        assert_eq!(transform.filter_string(), "brightness(100%) contrast(100%)");
    }

    #[test]
    fn setters_clamp_to_supported_ranges() {
        let mut transform = ImageTransform::identity();
        transform.set_scale(40.0);
        assert_eq!(transform.scale, MAX_SCALE);
        transform.set_scale(f64::NAN);
        assert_eq!(transform.scale, 1.0);
        transform.set_rotation_degrees(450.0);
        assert_eq!(transform.rotation_degrees, 90.0);
        transform.set_brightness_pct(900);
        assert_eq!(transform.brightness_pct, MAX_PHOTOMETRIC_PERCENT);
    }

    #[test]
    fn filter_string_lists_all_photometric_parts_in_order() {
        let mut transform = ImageTransform::identity();
        transform.set_brightness_pct(120);
        transform.set_contrast_pct(80);
        transform.set_filter(FilterKind::Sepia);
        assert_eq!(
            transform.filter_string(),
            "brightness(120%) contrast(80%) sepia(100%)"
        );
    }
}
