//! Software compositing on top of `image` buffers.

use image::{Pixel, Rgba, RgbaImage};
use mirror_platform::geometry::{Affine, Point, Rect};
use mirror_platform::screen::PixelBuffer;
use mirror_platform::surface::{MirrorLayout, MirrorTransform};

/// Copy a pixel buffer into an image, dropping any row padding.
/// Returns `None` for empty or truncated buffers.
pub fn to_image(buffer: &PixelBuffer) -> Option<RgbaImage> {
    if buffer.is_empty() {
        return None;
    }

    let row_bytes = buffer.width as usize * 4;
    if buffer.stride as usize == row_bytes {
        let len = row_bytes * buffer.height as usize;
        return RgbaImage::from_raw(buffer.width, buffer.height, buffer.data[..len].to_vec());
    }

    let mut packed = Vec::with_capacity(row_bytes * buffer.height as usize);
    for row in 0..buffer.height as usize {
        let start = row * buffer.stride as usize;
        packed.extend_from_slice(&buffer.data[start..start + row_bytes]);
    }
    RgbaImage::from_raw(buffer.width, buffer.height, packed)
}

pub fn from_image(image: RgbaImage) -> PixelBuffer {
    let (width, height) = image.dimensions();
    PixelBuffer::new(width, height, image.into_raw())
}

/// Draw `src` onto `canvas` through `to_canvas`, which maps source pixel
/// coordinates to canvas pixel coordinates. Nearest-neighbour sampling with
/// source-over blending; anything outside the canvas is clipped.
pub fn draw_transformed(canvas: &mut RgbaImage, src: &RgbaImage, to_canvas: &Affine) {
    let Some(inverse) = to_canvas.invert() else {
        return;
    };

    let (src_w, src_h) = src.dimensions();
    let bounds = to_canvas.bounds_of(Rect::new(0.0, 0.0, src_w as f64, src_h as f64));

    let clamp = |v: f64, max: u32| v.clamp(0.0, max as f64) as u32;
    let x0 = clamp(bounds.origin.x.floor(), canvas.width());
    let y0 = clamp(bounds.origin.y.floor(), canvas.height());
    let x1 = clamp((bounds.origin.x + bounds.size.width).ceil(), canvas.width());
    let y1 = clamp((bounds.origin.y + bounds.size.height).ceil(), canvas.height());

    for y in y0..y1 {
        for x in x0..x1 {
            let p = inverse.apply(Point::new(x as f64 + 0.5, y as f64 + 0.5));
            if p.x < 0.0 || p.y < 0.0 {
                continue;
            }
            let (sx, sy) = (p.x as u32, p.y as u32);
            if sx >= src_w || sy >= src_h {
                continue;
            }
            let px = src.get_pixel(sx, sy);
            match px[3] {
                0 => {}
                255 => canvas.put_pixel(x, y, *px),
                _ => canvas.get_pixel_mut(x, y).blend(px),
            }
        }
    }
}

/// Mapping from frame pixels to surface pixels: fit into the mirror
/// rectangle, rotate about its center, then scale the whole surface about
/// the surface center.
pub fn mirror_affine(
    frame_w: u32,
    frame_h: u32,
    layout: &MirrorLayout,
    transform: &MirrorTransform,
) -> Affine {
    let rect = layout.mirror_rect;
    let rect_center = rect.center();
    let surface_center = Point::new(layout.target.width / 2.0, layout.target.height / 2.0);

    Affine::scale(
        rect.size.width / frame_w.max(1) as f64,
        rect.size.height / frame_h.max(1) as f64,
    )
    .then(&Affine::translation(-rect.size.width / 2.0, -rect.size.height / 2.0))
    .then(&transform.rotation.raster_affine())
    .then(&Affine::translation(rect_center.x, rect_center.y))
    .then(&Affine::translation(-surface_center.x, -surface_center.y))
    .then(&Affine::scale(transform.surface_scale, transform.surface_scale))
    .then(&Affine::translation(surface_center.x, surface_center.y))
}

/// Render what an output surface shows for `frame`
pub fn render_mirror(
    frame: &PixelBuffer,
    layout: &MirrorLayout,
    transform: &MirrorTransform,
    background: Rgba<u8>,
) -> Option<RgbaImage> {
    let src = to_image(frame)?;
    let width = layout.target.width.round() as u32;
    let height = layout.target.height.round() as u32;
    if width == 0 || height == 0 {
        return None;
    }

    let mut canvas = RgbaImage::from_pixel(width, height, background);
    let m = mirror_affine(src.width(), src.height(), layout, transform);
    draw_transformed(&mut canvas, &src, &m);
    Some(canvas)
}
