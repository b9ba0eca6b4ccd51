use image::{imageops, Rgba, RgbaImage};

use crate::editor::{FilterKind, ImageTransform};

pub const BLUR_SIGMA: f32 = 4.0;

// BT.709 luminance weights.
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Row-major 4x5 color matrix over normalized RGBA; the fifth column is an offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix([f32; 20]);

impl ColorMatrix {
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, 0.0,
    ]);

    pub fn brightness(factor: f32) -> Self {
        Self::rgb_affine(factor, 0.0)
    }

    pub fn contrast(factor: f32) -> Self {
        Self::rgb_affine(factor, (1.0 - factor) / 2.0)
    }

    pub fn grayscale() -> Self {
        Self([
            LUMA_R, LUMA_G, LUMA_B, 0.0, 0.0, //
            LUMA_R, LUMA_G, LUMA_B, 0.0, 0.0, //
            LUMA_R, LUMA_G, LUMA_B, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    pub fn sepia() -> Self {
        Self([
            0.393, 0.769, 0.189, 0.0, 0.0, //
            0.349, 0.686, 0.168, 0.0, 0.0, //
            0.272, 0.534, 0.131, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    pub fn invert() -> Self {
        Self::rgb_affine(-1.0, 1.0)
    }

    fn rgb_affine(scale: f32, offset: f32) -> Self {
        Self([
            scale, 0.0, 0.0, 0.0, offset, //
            0.0, scale, 0.0, 0.0, offset, //
            0.0, 0.0, scale, 0.0, offset, //
            0.0, 0.0, 0.0, 1.0, 0.0,
        ])
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Matrix equivalent to applying `self` first and `next` second.
    pub fn then(self, next: Self) -> Self {
        let a = &self.0;
        let b = &next.0;
        let mut out = [0.0_f32; 20];
        for row in 0..4 {
            for col in 0..5 {
                let mut sum = (0..4)
                    .map(|k| b[row * 5 + k] * a[k * 5 + col])
                    .sum::<f32>();
                if col == 4 {
                    sum += b[row * 5 + 4];
                }
                out[row * 5 + col] = sum;
            }
        }
        Self(out)
    }

    pub fn apply(&self, pixel: Rgba<u8>) -> Rgba<u8> {
        let input = pixel.0.map(|channel| f32::from(channel) / 255.0);
        let m = &self.0;
        let mut output = [0_u8; 4];
        for (row, slot) in output.iter_mut().enumerate() {
            let value = m[row * 5] * input[0]
                + m[row * 5 + 1] * input[1]
                + m[row * 5 + 2] * input[2]
                + m[row * 5 + 3] * input[3]
                + m[row * 5 + 4];
            *slot = (value * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        Rgba(output)
    }
}

/// Brightness, then contrast, then the filter kind, folded into one matrix.
pub fn photometric_matrix(transform: &ImageTransform) -> ColorMatrix {
    let brightness = f32::from(transform.brightness_pct) / 100.0;
    let contrast = f32::from(transform.contrast_pct) / 100.0;
    let mut matrix = ColorMatrix::IDENTITY;
    if transform.brightness_pct != 100 {
        matrix = matrix.then(ColorMatrix::brightness(brightness));
    }
    if transform.contrast_pct != 100 {
        matrix = matrix.then(ColorMatrix::contrast(contrast));
    }
    match transform.filter {
        FilterKind::Grayscale => matrix.then(ColorMatrix::grayscale()),
        FilterKind::Sepia => matrix.then(ColorMatrix::sepia()),
        FilterKind::Invert => matrix.then(ColorMatrix::invert()),
        FilterKind::None | FilterKind::Blur => matrix,
    }
}

/// Returns the photometrically filtered copy of `image`.
pub fn apply_photometric(image: &RgbaImage, transform: &ImageTransform) -> RgbaImage {
    let matrix = photometric_matrix(transform);
    let mut output = image.clone();
    if !matrix.is_identity() {
        for pixel in output.pixels_mut() {
            *pixel = matrix.apply(*pixel);
        }
    }
    if transform.filter == FilterKind::Blur {
        output = imageops::blur(&output, BLUR_SIGMA);
    }
    output
}
