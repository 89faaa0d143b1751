//! Scale-and-blit onto a surface.

use alloc::vec;
use alloc::vec::Vec;

use imgref::{ImgRef, ImgVec};
use rgb::Rgba;

use crate::error::SurfaceError;
use crate::surface::{Surface, TRANSPARENT};

/// Resample `src` to `width × height` by nearest neighbor.
///
/// Each destination pixel takes the source pixel under its center, so
/// `sx = ((2·dx + 1) · src_w) / (2 · dst_w)`. Aspect ratio is not preserved.
/// An empty source yields a transparent matrix.
pub fn scale_nearest(src: ImgRef<'_, Rgba<u8>>, width: usize, height: usize) -> ImgVec<Rgba<u8>> {
    let (src_w, src_h) = (src.width(), src.height());
    if src_w == 0 || src_h == 0 {
        return ImgVec::new(vec![TRANSPARENT; width * height], width, height);
    }

    let columns: Vec<usize> = (0..width).map(|dx| center(dx, src_w, width)).collect();
    let buf = src.buf();
    let stride = src.stride();

    let mut out = Vec::with_capacity(width * height);
    for dy in 0..height {
        let row = center(dy, src_h, height) * stride;
        out.extend(columns.iter().map(|&sx| buf[row + sx]));
    }
    ImgVec::new(out, width, height)
}

#[inline]
fn center(d: usize, src_len: usize, dst_len: usize) -> usize {
    let s = ((2 * d + 1) * src_len) / (2 * dst_len);
    s.min(src_len - 1)
}

/// Stretch `image` over the whole of `target`, overwriting every pixel, then
/// flush the target.
///
/// No blending is done: source alpha is written through as-is.
pub fn render<S>(image: ImgRef<'_, Rgba<u8>>, target: &mut S) -> Result<(), SurfaceError>
where
    S: Surface + ?Sized,
{
    let bounds = target.bounds();
    if !bounds.is_empty() {
        let scaled = scale_nearest(image, bounds.width() as usize, bounds.height() as usize);
        for (dy, row) in scaled.rows().enumerate() {
            let y = bounds.y0 + dy as i32;
            for (dx, &c) in row.iter().enumerate() {
                target.set(bounds.x0 + dx as i32, y, c);
            }
        }
        log::debug!(
            "rendered {}x{} image onto {bounds}",
            image.width(),
            image.height()
        );
    }
    target.flush()
}
