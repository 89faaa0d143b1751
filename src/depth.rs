//! Packed RGB pixel encodings used by framebuffer devices.
//!
//! All three encodings are little-endian packed RGB:
//!
//! | depth | bytes | layout                               |
//! |-------|-------|--------------------------------------|
//! | 16    | 2     | `RRRRRGGG GGGBBBBB` as a `u16` (LE)  |
//! | 24    | 3     | `B, G, R`                            |
//! | 32    | 4     | `B, G, R, A`                         |

use rgb::Rgba;

/// Color depth of a packed RGB surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColorDepth {
    /// RGB565.
    Bpp16 = 16,
    /// BGR888.
    Bpp24 = 24,
    /// BGRA8888.
    Bpp32 = 32,
}

impl ColorDepth {
    /// Map a bits-per-pixel value to a depth. Returns `None` for anything
    /// other than 16, 24 or 32.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(Self::Bpp16),
            24 => Some(Self::Bpp24),
            32 => Some(Self::Bpp32),
            _ => None,
        }
    }

    /// Bits per pixel.
    #[inline]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Bytes per pixel.
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        self as usize / 8
    }

    /// Decode one pixel from `bytes`.
    ///
    /// `bytes` must hold at least [`bytes_per_pixel`](Self::bytes_per_pixel)
    /// bytes; shorter input yields transparent black.
    pub fn unpack(self, bytes: &[u8]) -> Rgba<u8> {
        match (self, bytes) {
            (Self::Bpp16, [lo, hi, ..]) => rgb565_to_rgba(u16::from_le_bytes([*lo, *hi])),
            (Self::Bpp24, [b, g, r, ..]) => Rgba::new(*r, *g, *b, 255),
            (Self::Bpp32, [b, g, r, a, ..]) => Rgba::new(*r, *g, *b, *a),
            _ => Rgba::new(0, 0, 0, 0),
        }
    }

    /// Encode one pixel into `bytes`. Short output slices are left untouched.
    pub fn pack(self, c: Rgba<u8>, bytes: &mut [u8]) {
        match (self, bytes) {
            (Self::Bpp16, [lo, hi, ..]) => {
                [*lo, *hi] = rgba_to_rgb565(c).to_le_bytes();
            }
            (Self::Bpp24, [b, g, r, ..]) => {
                *b = c.b;
                *g = c.g;
                *r = c.r;
            }
            (Self::Bpp32, [b, g, r, a, ..]) => {
                *b = c.b;
                *g = c.g;
                *r = c.r;
                *a = c.a;
            }
            _ => {}
        }
    }

    /// Reduce `c` to the precision this depth can store.
    ///
    /// `unpack(pack(c)) == quantize(c)` for every color.
    pub fn quantize(self, c: Rgba<u8>) -> Rgba<u8> {
        match self {
            Self::Bpp16 => rgb565_to_rgba(rgba_to_rgb565(c)),
            Self::Bpp24 => Rgba::new(c.r, c.g, c.b, 255),
            Self::Bpp32 => c,
        }
    }
}

impl core::fmt::Display for ColorDepth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} bpp", self.bits())
    }
}

/// Expand an RGB565 value, replicating the top bits of each field into the
/// freed low bits so that full-scale fields map to 255.
#[inline]
pub fn rgb565_to_rgba(pixel: u16) -> Rgba<u8> {
    let r = ((pixel >> 11) & 0x1F) as u8;
    let g = ((pixel >> 5) & 0x3F) as u8;
    let b = (pixel & 0x1F) as u8;
    Rgba::new(expand5(r), expand6(g), expand5(b), 255)
}

/// Truncate 8-bit channels into an RGB565 value. Alpha is dropped.
#[inline]
pub fn rgba_to_rgb565(c: Rgba<u8>) -> u16 {
    let r5 = u16::from(c.r >> 3);
    let g6 = u16::from(c.g >> 2);
    let b5 = u16::from(c.b >> 3);
    (r5 << 11) | (g6 << 5) | b5
}

#[inline]
pub(crate) fn expand5(v: u8) -> u8 {
    (v << 3) | (v >> 2)
}

#[inline]
pub(crate) fn expand6(v: u8) -> u8 {
    (v << 2) | (v >> 4)
}
