//! Native-resolution compositing of an [`EditorState`] onto a cairo surface.

pub mod driver;
pub mod filters;
pub mod scheduler;
mod surface;

use std::io::Cursor;

use gtk4::cairo::{Context, Format, ImageSurface, LineJoin};
use image::{ImageFormat, RgbaImage};
use thiserror::Error;

use crate::editor::{EditableTextBox, EditorState, FontSlant, FontWeight, ImageTransform};
use crate::geometry::{Color, SurfaceSize};
use crate::layout::{layout_block, line_height_for, wrap_text, BlockMetrics};

pub use scheduler::{RenderScheduler, RenderTrigger};
pub use surface::{cairo_surface_to_rgba_image, rgba_image_to_cairo_surface};

pub const DEFAULT_BACKGROUND: Color = Color::new(0xEE, 0xEE, 0xEE);
pub const DEFAULT_FALLBACK_SIZE: SurfaceSize = SurfaceSize::new(600, 600);
const FALLBACK_CHAR_WIDTH_RATIO: f64 = 0.62;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cairo error: {0}")]
    Cairo(#[from] gtk4::cairo::Error),
    #[error("cannot access surface pixels: {0}")]
    SurfaceData(#[source] gtk4::cairo::BorrowError),
    #[error("surface dimensions exceed the supported range")]
    SurfaceTooLarge,
    #[error("png encoding failed: {0}")]
    Encode(#[source] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compositor {
    background: Color,
    fallback_size: SurfaceSize,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(DEFAULT_BACKGROUND, DEFAULT_FALLBACK_SIZE)
    }
}

impl Compositor {
    pub const fn new(background: Color, fallback_size: SurfaceSize) -> Self {
        Self {
            background,
            fallback_size,
        }
    }

    /// Native bitmap size, or the fallback size grown to cover every box.
    pub fn surface_size(&self, base: Option<&RgbaImage>, state: &EditorState) -> SurfaceSize {
        if let Some(base) = base {
            return SurfaceSize::new(base.width().max(1), base.height().max(1));
        }
        state
            .text_boxes
            .iter()
            .fold(self.fallback_size, |size, text_box| {
                let right = u32::try_from(text_box.bounds.right().max(0)).unwrap_or(0);
                let bottom = u32::try_from(text_box.bounds.bottom().max(0)).unwrap_or(0);
                SurfaceSize::new(size.width.max(right), size.height.max(bottom))
            })
    }

    pub fn compose(
        &self,
        state: &EditorState,
        base: Option<&RgbaImage>,
    ) -> Result<RgbaImage, RenderError> {
        let size = self.surface_size(base, state);
        let mut target = ImageSurface::create(
            Format::ARgb32,
            size.width_i32().max(1),
            size.height_i32().max(1),
        )?;

        {
            let context = Context::new(&target)?;
            let (r, g, b) = self.background.to_cairo_rgb();
            context.set_source_rgb(r, g, b);
            context.paint()?;

            if let Some(base) = base {
                paint_base_image(&context, base, &state.transform, size)?;
            }
            for text_box in &state.text_boxes {
                paint_text_box(&context, text_box)?;
            }
        }

        tracing::trace!(
            width = size.width,
            height = size.height,
            boxes = state.text_boxes.len(),
            has_base = base.is_some(),
            "composited frame"
        );
        cairo_surface_to_rgba_image(&mut target)
    }
}

fn paint_base_image(
    context: &Context,
    base: &RgbaImage,
    transform: &ImageTransform,
    size: SurfaceSize,
) -> Result<(), RenderError> {
    let filtered = if transform.has_photometric_effect() {
        tracing::trace!(filter = %transform.filter_string(), "applying photometric filters");
        filters::apply_photometric(base, transform)
    } else {
        base.clone()
    };
    let source = rgba_image_to_cairo_surface(&filtered)?;
    let center_x = f64::from(size.width) / 2.0;
    let center_y = f64::from(size.height) / 2.0;

    context.save()?;
    if transform.has_geometric_effect() {
        context.translate(center_x, center_y);
        context.rotate(transform.rotation_radians());
        context.scale(transform.scale, transform.scale);
        context.translate(-center_x, -center_y);
    }
    context.set_source_surface(&source, 0.0, 0.0)?;
    context.paint()?;
    context.restore()?;
    Ok(())
}

fn paint_text_box(context: &Context, text_box: &EditableTextBox) -> Result<(), RenderError> {
    if text_box.text.is_empty() {
        return Ok(());
    }
    let style = &text_box.style;
    let font_size = f64::from(style.font_size.max(1));
    let weight = match style.weight {
        FontWeight::Bold => gtk4::cairo::FontWeight::Bold,
        FontWeight::Normal => gtk4::cairo::FontWeight::Normal,
    };
    let slant = match style.slant {
        FontSlant::Italic => gtk4::cairo::FontSlant::Italic,
        FontSlant::Normal => gtk4::cairo::FontSlant::Normal,
    };

    context.save()?;
    context.select_font_face(style.font_family.cairo_font_name(), slant, weight);
    context.set_font_size(font_size);
    let extents = context.font_extents()?;
    let metrics = BlockMetrics {
        line_height: line_height_for(style.font_size),
        ascent: extents.ascent(),
        descent: extents.descent(),
    };

    let fallback_char_width = font_size * FALLBACK_CHAR_WIDTH_RATIO;
    let measure = |line: &str| {
        context
            .text_extents(line)
            .map(|extents| extents.x_advance())
            .unwrap_or_else(|_| line.chars().count() as f64 * fallback_char_width)
    };
    let lines = wrap_text(&text_box.text, f64::from(text_box.bounds.width), measure);
    let widths = lines.iter().map(|line| measure(line)).collect::<Vec<_>>();
    let placements = layout_block(&lines, &widths, text_box.bounds, style.align, metrics);

    let alpha = style.alpha();
    if alpha < 1.0 {
        context.push_group();
    }
    context.new_path();
    for placement in placements.iter().filter(|placement| !placement.text.is_empty()) {
        context.move_to(placement.x, placement.baseline_y);
        context.text_path(&placement.text);
    }
    if style.stroke_width > 0 {
        let (r, g, b) = style.stroke_color.to_cairo_rgb();
        context.set_source_rgb(r, g, b);
        context.set_line_width(f64::from(style.stroke_width));
        context.set_line_join(LineJoin::Round);
        context.stroke_preserve()?;
    }
    let (r, g, b) = style.color.to_cairo_rgb();
    context.set_source_rgb(r, g, b);
    context.fill()?;
    if alpha < 1.0 {
        context.pop_group_to_source()?;
        context.paint_with_alpha(alpha)?;
    }
    context.restore()?;
    Ok(())
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(RenderError::Encode)?;
    Ok(bytes)
}
