use gtk4::cairo::{Format, ImageSurface};
use image::RgbaImage;

use super::RenderError;

/// Copies straight-alpha RGBA into a premultiplied native-endian ARGB32 surface.
pub fn rgba_image_to_cairo_surface(image: &RgbaImage) -> Result<ImageSurface, RenderError> {
    let width = i32::try_from(image.width()).map_err(|_| RenderError::SurfaceTooLarge)?;
    let height = i32::try_from(image.height()).map_err(|_| RenderError::SurfaceTooLarge)?;
    let mut surface = ImageSurface::create(Format::ARgb32, width, height)?;
    let stride = usize::try_from(surface.stride()).map_err(|_| RenderError::SurfaceTooLarge)?;
    let row_len = image.width() as usize * 4;

    {
        let mut data = surface.data().map_err(RenderError::SurfaceData)?;
        for (row, src_row) in image.as_raw().chunks_exact(row_len.max(1)).enumerate() {
            let offset = row * stride;
            let Some(dst_row) = data.get_mut(offset..offset + row_len) else {
                return Err(RenderError::SurfaceTooLarge);
            };
            for (src, dst) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
                let [r, g, b, a] = [src[0], src[1], src[2], src[3]];
                let premultiply = |channel: u8| match a {
                    0 => 0,
                    255 => channel,
                    _ => ((u16::from(channel) * u16::from(a) + 127) / 255) as u8,
                };
                write_native_argb(dst, premultiply(r), premultiply(g), premultiply(b), a);
            }
        }
    }

    surface.mark_dirty();
    Ok(surface)
}

/// Reads an ARGB32 surface back into straight-alpha RGBA.
pub fn cairo_surface_to_rgba_image(surface: &mut ImageSurface) -> Result<RgbaImage, RenderError> {
    surface.flush();
    let width = u32::try_from(surface.width()).map_err(|_| RenderError::SurfaceTooLarge)?;
    let height = u32::try_from(surface.height()).map_err(|_| RenderError::SurfaceTooLarge)?;
    let stride = usize::try_from(surface.stride()).map_err(|_| RenderError::SurfaceTooLarge)?;
    let row_len = width as usize * 4;
    let mut rgba = Vec::with_capacity(row_len * height as usize);

    let data = surface.data().map_err(RenderError::SurfaceData)?;
    for row in 0..height as usize {
        let offset = row * stride;
        let Some(src_row) = data.get(offset..offset + row_len) else {
            return Err(RenderError::SurfaceTooLarge);
        };
        for src in src_row.chunks_exact(4) {
            let (r, g, b, a) = read_native_argb(src);
            let unpremultiply = |channel: u8| match a {
                0 => 0,
                255 => channel,
                _ => ((u16::from(channel) * 255 + u16::from(a) / 2) / u16::from(a)).min(255) as u8,
            };
            rgba.extend_from_slice(&[unpremultiply(r), unpremultiply(g), unpremultiply(b), a]);
        }
    }
    drop(data);

    RgbaImage::from_raw(width, height, rgba).ok_or(RenderError::SurfaceTooLarge)
}

// ARGB32 stores each pixel as a native-endian u32.
fn write_native_argb(dst: &mut [u8], r: u8, g: u8, b: u8, a: u8) {
    let value = (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
    dst.copy_from_slice(&value.to_ne_bytes());
}

fn read_native_argb(src: &[u8]) -> (u8, u8, u8, u8) {
    let value = u32::from_ne_bytes([src[0], src[1], src[2], src[3]]);
    (
        (value >> 16) as u8,
        (value >> 8) as u8,
        value as u8,
        (value >> 24) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn opaque_pixels_survive_a_surface_round_trip() {
        let mut image = RgbaImage::from_pixel(3, 2, Rgba([10, 200, 30, 255]));
        image.put_pixel(2, 1, Rgba([255, 0, 128, 255]));

        let mut surface = rgba_image_to_cairo_surface(&image).expect("surface");
        let back = cairo_surface_to_rgba_image(&mut surface).expect("read back");
        assert_eq!(back, image);
    }

    #[test]
    fn transparent_pixels_read_back_as_zero() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([90, 90, 90, 0]));
        let mut surface = rgba_image_to_cairo_surface(&image).expect("surface");
        let back = cairo_surface_to_rgba_image(&mut surface).expect("read back");
        assert_eq!(back.get_pixel(1, 1).0, [0, 0, 0, 0]);
    }

    #[test]
    fn translucent_pixels_are_premultiplied_on_the_surface() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 0, 128]));
        let mut surface = rgba_image_to_cairo_surface(&image).expect("surface");
        {
            let data = surface.data().expect("surface data");
            let (r, g, b, a) = read_native_argb(&data[0..4]);
            assert_eq!((r, g, b, a), (100, 50, 0, 128));
        }
        let back = cairo_surface_to_rgba_image(&mut surface).expect("read back");
        let [r, g, _, a] = back.get_pixel(0, 0).0;
        assert_eq!(a, 128);
        assert!((i16::from(r) - 200).abs() <= 1);
        assert!((i16::from(g) - 100).abs() <= 1);
    }
}
