//! Pixel-addressable surfaces.
//!
//! [`Surface`] is the capability set the compositor draws through. It is
//! implemented by the memory-mapped [`Framebuffer`](crate::Framebuffer), by
//! the heap-backed [`MemorySurface`], and by [`SurfaceView`], a clipped
//! window onto any other surface.
//!
//! Coordinates are signed so that callers can pass unclipped positions.
//! Reads outside the surface return [`TRANSPARENT`]; writes outside it are
//! dropped.

use alloc::vec;
use alloc::vec::Vec;

use rgb::Rgba;

use crate::depth::ColorDepth;
use crate::geometry::Rect;

/// Sentinel returned for out-of-range reads.
pub const TRANSPARENT: Rgba<u8> = Rgba {
    r: 0,
    g: 0,
    b: 0,
    a: 0,
};

/// Opaque black, used to clear devices.
pub const BLACK: Rgba<u8> = Rgba {
    r: 0,
    g: 0,
    b: 0,
    a: 255,
};

/// A rectangle of pixels that can be read and written one at a time.
pub trait Surface {
    /// Addressable area. Pixels outside it are never touched.
    fn bounds(&self) -> Rect;

    /// Read the pixel at `(x, y)`, or [`TRANSPARENT`] when out of range.
    fn get(&self, x: i32, y: i32) -> Rgba<u8>;

    /// Write the pixel at `(x, y)`. No-op when out of range.
    fn set(&mut self, x: i32, y: i32, c: Rgba<u8>);

    /// Push pending writes to the device. No-op unless the surface is backed
    /// by something that needs it.
    fn flush(&mut self) -> Result<(), crate::SurfaceError> {
        Ok(())
    }

    /// Overwrite every pixel in [`bounds`](Surface::bounds) with `c`.
    fn fill(&mut self, c: Rgba<u8>) {
        let b = self.bounds();
        for y in b.y0..b.y1 {
            for x in b.x0..b.x1 {
                self.set(x, y, c);
            }
        }
    }

    /// Borrow the part of this surface that lies inside `rect`.
    ///
    /// `rect` is clipped to [`bounds`](Surface::bounds); if nothing is left
    /// the view is empty and every operation on it is a no-op.
    fn sub_view(&mut self, rect: Rect) -> SurfaceView<'_, Self>
    where
        Self: Sized,
    {
        let bounds = rect.intersect(&self.bounds());
        SurfaceView {
            parent: self,
            bounds,
        }
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Memory layout of a packed surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Geometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes between row starts. At least `width * depth.bytes_per_pixel()`.
    pub stride: usize,
    /// Pixel encoding.
    pub depth: ColorDepth,
}

impl Geometry {
    /// Tightly packed layout (no row padding).
    pub fn packed(width: u32, height: u32, depth: ColorDepth) -> Self {
        Self {
            width,
            height,
            stride: width as usize * depth.bytes_per_pixel(),
            depth,
        }
    }

    /// Bytes covered by the layout (`stride * height`).
    pub fn byte_len(&self) -> usize {
        self.stride.saturating_mul(self.height as usize)
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Byte range of the pixel at `(x, y)` within `len` bytes of storage.
    ///
    /// `None` if the coordinates are outside the layout or the pixel would
    /// extend past `len`.
    #[inline]
    fn pixel_range(&self, x: i32, y: i32, len: usize) -> Option<core::ops::Range<usize>> {
        let (x, y) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.depth.bytes_per_pixel();
        let start = (y as usize)
            .checked_mul(self.stride)?
            .checked_add(x as usize * bpp)?;
        let end = start.checked_add(bpp)?;
        (end <= len).then_some(start..end)
    }

    /// Decode the pixel at `(x, y)` from `data`.
    pub(crate) fn read(&self, data: &[u8], x: i32, y: i32) -> Rgba<u8> {
        match self.pixel_range(x, y, data.len()) {
            Some(r) => self.depth.unpack(&data[r]),
            None => TRANSPARENT,
        }
    }

    /// Encode `c` into the pixel at `(x, y)` of `data`.
    pub(crate) fn write(&self, data: &mut [u8], x: i32, y: i32, c: Rgba<u8>) {
        if let Some(r) = self.pixel_range(x, y, data.len()) {
            self.depth.pack(c, &mut data[r]);
        }
    }
}

// ---------------------------------------------------------------------------
// SurfaceView
// ---------------------------------------------------------------------------

/// A clipped window onto another surface.
///
/// Shares the parent's storage. Coordinates are the parent's coordinates;
/// only the addressable area shrinks.
#[derive(Debug)]
pub struct SurfaceView<'a, S: Surface + ?Sized> {
    parent: &'a mut S,
    bounds: Rect,
}

impl<S: Surface + ?Sized> Surface for SurfaceView<'_, S> {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn get(&self, x: i32, y: i32) -> Rgba<u8> {
        if self.bounds.contains(x, y) {
            self.parent.get(x, y)
        } else {
            TRANSPARENT
        }
    }

    fn set(&mut self, x: i32, y: i32, c: Rgba<u8>) {
        if self.bounds.contains(x, y) {
            self.parent.set(x, y, c);
        }
    }

    fn flush(&mut self) -> Result<(), crate::SurfaceError> {
        self.parent.flush()
    }
}

// ---------------------------------------------------------------------------
// MemorySurface
// ---------------------------------------------------------------------------

/// Heap-backed surface with the same byte layout as a device.
///
/// Useful as an off-screen target and as a stand-in for a framebuffer in
/// tests.
#[derive(Clone, PartialEq, Eq)]
pub struct MemorySurface {
    data: Vec<u8>,
    geometry: Geometry,
}

impl MemorySurface {
    /// Zero-filled surface with no row padding.
    pub fn new(width: u32, height: u32, depth: ColorDepth) -> Self {
        Self::with_geometry(Geometry::packed(width, height, depth))
    }

    /// Zero-filled surface with an explicit layout.
    pub fn with_geometry(geometry: Geometry) -> Self {
        Self {
            data: vec![0; geometry.byte_len()],
            geometry,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Raw packed bytes, `stride * height` long.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl Surface for MemorySurface {
    fn bounds(&self) -> Rect {
        self.geometry.bounds()
    }

    fn get(&self, x: i32, y: i32) -> Rgba<u8> {
        self.geometry.read(&self.data, x, y)
    }

    fn set(&mut self, x: i32, y: i32, c: Rgba<u8>) {
        self.geometry.write(&mut self.data, x, y, c);
    }
}

impl core::fmt::Debug for MemorySurface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemorySurface")
            .field("geometry", &self.geometry)
            .field("data_len", &self.data.len())
            .finish()
    }
}
