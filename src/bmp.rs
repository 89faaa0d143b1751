//! Byte-level BMP parser for variants the general-purpose decoder rejects.
//!
//! Handles 1, 4 and 8-bit palettized images and 16, 24 and 32-bit direct
//! color. Compression fields are ignored; every file is read as
//! uncompressed rows padded to four bytes.
//!
//! Header fields are validated. Pixel data is not: any sample whose bytes
//! lie past the end of the input is left at [`TRANSPARENT`] so that a
//! truncated download still shows whatever arrived. Pair this with
//! [`ResourceLimits`] since dimensions come straight from the file.

use alloc::vec;
use alloc::vec::Vec;

use imgref::ImgVec;
use rgb::{Rgb, Rgba};

use crate::depth::{expand5, expand6};
use crate::error::BmpError;
use crate::limits::ResourceLimits;
use crate::surface::TRANSPARENT;

/// Size of the `BITMAPFILEHEADER`.
const FILE_HEADER_LEN: usize = 14;

/// Bytes needed to read every fixed field up to bits-per-pixel.
const MIN_HEADER_LEN: usize = 30;

const OPAQUE_BLACK: Rgba<u8> = Rgba {
    r: 0,
    g: 0,
    b: 0,
    a: 255,
};

/// Fields read from the file and info headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BmpHeader {
    /// Byte offset of the pixel array.
    pub data_offset: u32,
    /// Size of the info header (40 for `BITMAPINFOHEADER`).
    pub header_size: u32,
    /// Width in pixels (absolute value of the stored field).
    pub width: u32,
    /// Height in pixels (absolute value of the stored field).
    pub height: u32,
    /// Rows are stored last row first. True when the stored height is positive.
    pub bottom_up: bool,
    pub bits_per_pixel: u16,
    /// Palette entries to read; defaulted to `1 << bpp` for indexed images
    /// that leave it zero.
    pub num_colors: u32,
}

impl BmpHeader {
    /// Parse the fixed header fields.
    pub fn parse(data: &[u8]) -> Result<Self, BmpError> {
        if data.len() < 2 || data[..2] != *b"BM" {
            return Err(BmpError::InvalidSignature);
        }
        if data.len() < MIN_HEADER_LEN {
            return Err(BmpError::TruncatedHeader {
                len: data.len(),
                needed: MIN_HEADER_LEN,
            });
        }

        let data_offset = read_u32(data, 10).unwrap_or(0);
        let header_size = read_u32(data, 14).unwrap_or(0);
        let raw_width = read_u32(data, 18).unwrap_or(0) as i32;
        let raw_height = read_u32(data, 22).unwrap_or(0) as i32;
        let bits_per_pixel = read_u16(data, 28).unwrap_or(0);

        let mut num_colors = if header_size >= 36 {
            read_u32(data, 46).unwrap_or(0)
        } else {
            0
        };
        if num_colors == 0 && bits_per_pixel <= 8 {
            num_colors = 1 << bits_per_pixel;
        }

        Ok(Self {
            data_offset,
            header_size,
            width: raw_width.unsigned_abs(),
            height: raw_height.unsigned_abs(),
            bottom_up: raw_height >= 0,
            bits_per_pixel,
            num_colors,
        })
    }

    /// Bytes per stored row, padded to a multiple of four.
    pub fn row_stride(&self) -> usize {
        (self.width as usize * self.bits_per_pixel as usize).div_ceil(32) * 4
    }

    /// Whether pixels are palette indices.
    pub fn is_indexed(&self) -> bool {
        matches!(self.bits_per_pixel, 1 | 4 | 8)
    }
}

/// Color table for indexed images. Entries are opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette(Vec<Rgb<u8>>);

impl Palette {
    /// Black at index 0, white at index 1.
    pub fn monochrome() -> Self {
        Self(vec![Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)])
    }

    /// Read up to `header.num_colors` `B, G, R, reserved` entries following
    /// the info header.
    ///
    /// Entries cut off by the end of the buffer are dropped. If fewer than
    /// two survive, returns [`Palette::monochrome`].
    pub fn read(data: &[u8], header: &BmpHeader) -> Self {
        let start = FILE_HEADER_LEN.saturating_add(header.header_size as usize);
        // Indices can never exceed what the bit depth can express.
        let max = header.num_colors.min(1 << header.bits_per_pixel.min(8)) as usize;

        let entries: Vec<Rgb<u8>> = data
            .get(start..)
            .unwrap_or(&[])
            .chunks(4)
            .take(max)
            .take_while(|e| e.len() >= 3)
            .map(|e| Rgb::new(e[2], e[1], e[0]))
            .collect();

        if entries.len() < 2 {
            Self::monochrome()
        } else {
            Self(entries)
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the palette has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exchange the two entries of a monochrome palette. No-op for any
    /// other size.
    pub fn swap_monochrome(&mut self) {
        if self.0.len() == 2 {
            self.0.swap(0, 1);
        }
    }

    /// Look up an index; out-of-range indices map to opaque black.
    #[inline]
    pub fn get(&self, index: u8) -> Rgba<u8> {
        match self.0.get(index as usize) {
            Some(c) => Rgba::new(c.r, c.g, c.b, 255),
            None => OPAQUE_BLACK,
        }
    }
}

/// Decode a BMP file into a top-down RGBA matrix.
///
/// With `invert_monochrome`, a 1-bit image with a two-entry palette is
/// rendered with its palette swapped. Dimensions are checked against
/// [`ResourceLimits::default`].
pub fn decode(data: &[u8], invert_monochrome: bool) -> Result<ImgVec<Rgba<u8>>, BmpError> {
    decode_with_limits(data, invert_monochrome, &ResourceLimits::default())
}

/// [`decode`] with caller-chosen limits, checked before the output is
/// allocated.
///
/// Even with [`ResourceLimits::none`], a matrix that cannot be allocated is
/// reported as [`BmpError::TooLarge`].
pub fn decode_with_limits(
    data: &[u8],
    invert_monochrome: bool,
    limits: &ResourceLimits,
) -> Result<ImgVec<Rgba<u8>>, BmpError> {
    let header = BmpHeader::parse(data)?;
    if !matches!(header.bits_per_pixel, 1 | 4 | 8 | 16 | 24 | 32) {
        return Err(BmpError::UnsupportedBitDepth(header.bits_per_pixel));
    }
    if header.width == 0 || header.height == 0 {
        return Err(BmpError::EmptyImage);
    }
    limits.check_dimensions(header.width, header.height)?;

    log::debug!(
        "BMP header: {}x{}, {} bpp, data offset {}, header size {}, {} colors",
        header.width,
        header.height,
        header.bits_per_pixel,
        header.data_offset,
        header.header_size,
        header.num_colors
    );

    let palette = if header.is_indexed() {
        let mut palette = Palette::read(data, &header);
        if invert_monochrome && header.bits_per_pixel == 1 && palette.len() == 2 {
            log::info!("applying dark mode inversion to 1-bit BMP");
            palette.swap_monochrome();
        }
        Some(palette)
    } else {
        None
    };

    let width = header.width as usize;
    let height = header.height as usize;
    let stride = header.row_stride();
    let offset = header.data_offset as usize;
    let too_large = BmpError::TooLarge {
        width: header.width,
        height: header.height,
    };
    let len = width.checked_mul(height).ok_or_else(|| too_large.clone())?;
    let mut pixels = Vec::new();
    if pixels.try_reserve_exact(len).is_err() {
        return Err(too_large);
    }
    pixels.resize(len, TRANSPARENT);

    for (y, out_row) in pixels.chunks_exact_mut(width).enumerate() {
        let src_y = if header.bottom_up { height - 1 - y } else { y };
        let row_start = src_y
            .checked_mul(stride)
            .and_then(|o| o.checked_add(offset));
        let Some(row) = row_start.and_then(|s| data.get(s..)) else {
            continue;
        };

        for (x, out) in out_row.iter_mut().enumerate() {
            if let Some(c) = sample(row, x, header.bits_per_pixel, palette.as_ref()) {
                *out = c;
            }
        }
    }

    Ok(ImgVec::new(pixels, width, height))
}

/// Extract pixel `x` from a row slice that starts at the row's first byte
/// and runs to the end of the file. `None` when the bytes are missing.
#[inline]
fn sample(row: &[u8], x: usize, bpp: u16, palette: Option<&Palette>) -> Option<Rgba<u8>> {
    match bpp {
        24 | 32 => {
            let pos = x * (bpp as usize / 8);
            let bgr = row.get(pos..pos + 3)?;
            let a = if bpp == 32 {
                row.get(pos + 3).copied().unwrap_or(255)
            } else {
                255
            };
            Some(Rgba::new(bgr[2], bgr[1], bgr[0], a))
        }
        16 => {
            let pos = x * 2;
            let v = u16::from_le_bytes([*row.get(pos)?, *row.get(pos + 1)?]);
            Some(Rgba::new(
                expand5(((v >> 11) & 0x1F) as u8),
                expand6(((v >> 5) & 0x3F) as u8),
                expand5((v & 0x1F) as u8),
                255,
            ))
        }
        8 => {
            let index = *row.get(x)?;
            Some(palette?.get(index))
        }
        4 => {
            let byte = *row.get(x / 2)?;
            let index = if x % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            Some(palette?.get(index))
        }
        1 => {
            let byte = *row.get(x / 8)?;
            let index = (byte >> (7 - (x % 8))) & 1;
            Some(palette?.get(index))
        }
        _ => None,
    }
}

#[inline]
fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    let b = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

#[inline]
fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let b = data.get(at..at + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::limits::LimitExceeded;

    /// Assemble a BMP with a 40-byte info header.
    pub(crate) fn build_bmp(
        width: i32,
        height: i32,
        bpp: u16,
        palette: &[[u8; 4]],
        pixel_rows: &[&[u8]],
    ) -> Vec<u8> {
        let data_offset = 14 + 40 + palette.len() * 4;
        let mut out = Vec::new();
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&0u32.to_le_bytes()); // file size, unused
        out.extend_from_slice(&0u32.to_le_bytes()); // reserved
        out.extend_from_slice(&(data_offset as u32).to_le_bytes());
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // planes
        out.extend_from_slice(&bpp.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // compression
        out.extend_from_slice(&0u32.to_le_bytes()); // image size
        out.extend_from_slice(&2835u32.to_le_bytes());
        out.extend_from_slice(&2835u32.to_le_bytes());
        out.extend_from_slice(&(palette.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // important colors
        assert_eq!(out.len(), 54);
        for entry in palette {
            out.extend_from_slice(entry);
        }
        for row in pixel_rows {
            out.extend_from_slice(row);
        }
        out
    }

    fn px(img: &ImgVec<Rgba<u8>>, x: usize, y: usize) -> Rgba<u8> {
        img.buf()[y * img.stride() + x]
    }

    const BLACK: [u8; 4] = [0, 0, 0, 0];
    const WHITE: [u8; 4] = [255, 255, 255, 0];

    #[test]
    fn rejects_bad_signature() {
        assert!(matches!(decode(b"XX", false), Err(BmpError::InvalidSignature)));
        assert!(matches!(decode(b"", false), Err(BmpError::InvalidSignature)));
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(
            decode(b"BM\0\0\0\0", false),
            Err(BmpError::TruncatedHeader { len: 6, .. })
        ));
    }

    #[test]
    fn rejects_unsupported_depth() {
        let bmp = build_bmp(1, 1, 2, &[], &[&[0, 0, 0, 0]]);
        assert!(matches!(
            decode(&bmp, false),
            Err(BmpError::UnsupportedBitDepth(2))
        ));
    }

    #[test]
    fn rejects_empty() {
        let bmp = build_bmp(0, 4, 24, &[], &[]);
        assert!(matches!(decode(&bmp, false), Err(BmpError::EmptyImage)));
    }

    #[test]
    fn limits_apply_before_allocation() {
        let bmp = build_bmp(100_000, 100_000, 24, &[], &[]);
        let limits = ResourceLimits::none().with_max_pixels(1_000_000);
        assert!(matches!(
            decode_with_limits(&bmp, false, &limits),
            Err(BmpError::Limit(_))
        ));
    }

    #[test]
    fn huge_declared_size_is_rejected_by_default() {
        let bmp = build_bmp(i32::MIN, i32::MIN, 24, &[], &[]);
        assert!(matches!(
            decode(&bmp, false),
            Err(BmpError::Limit(LimitExceeded::Width { actual, .. })) if actual == 1 << 31
        ));

        let bmp = build_bmp(16384, 16384, 1, &[BLACK, WHITE], &[]);
        assert!(matches!(
            decode(&bmp, false),
            Err(BmpError::Limit(LimitExceeded::Pixels { .. }))
        ));
    }

    #[test]
    fn unallocatable_size_without_limits_is_an_error() {
        let bmp = build_bmp(i32::MIN, i32::MIN, 24, &[], &[]);
        assert_eq!(
            decode_with_limits(&bmp, false, &ResourceLimits::none()).map(|_| ()),
            Err(BmpError::TooLarge {
                width: 1 << 31,
                height: 1 << 31
            })
        );
    }

    #[test]
    fn header_fields() {
        let bmp = build_bmp(-3, -2, 4, &[BLACK, WHITE], &[]);
        let h = BmpHeader::parse(&bmp).unwrap();
        assert_eq!(h.width, 3);
        assert_eq!(h.height, 2);
        assert!(!h.bottom_up);
        assert_eq!(h.bits_per_pixel, 4);
        assert_eq!(h.num_colors, 2);
        assert_eq!(h.data_offset, 62);
        assert_eq!(h.row_stride(), 4);
    }

    #[test]
    fn num_colors_defaults_for_indexed() {
        let mut bmp = build_bmp(1, 1, 8, &[], &[]);
        bmp[46..50].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(BmpHeader::parse(&bmp).unwrap().num_colors, 256);
    }

    #[test]
    fn row_stride_is_four_byte_aligned() {
        let h = |width, bpp| BmpHeader {
            data_offset: 0,
            header_size: 40,
            width,
            height: 1,
            bottom_up: true,
            bits_per_pixel: bpp,
            num_colors: 0,
        };
        assert_eq!(h(1, 1).row_stride(), 4);
        assert_eq!(h(33, 1).row_stride(), 8);
        assert_eq!(h(3, 24).row_stride(), 12);
        assert_eq!(h(5, 24).row_stride(), 16);
        assert_eq!(h(3, 16).row_stride(), 8);
        assert_eq!(h(7, 4).row_stride(), 4);
    }

    #[test]
    fn bottom_up_24_bit() {
        // Stored bottom row first: (255,0,0) (0,255,0), then (0,0,255) (255,255,255).
        let bottom: &[u8] = &[0, 0, 255, 0, 255, 0, 0, 0];
        let top: &[u8] = &[255, 0, 0, 255, 255, 255, 0, 0];
        let bmp = build_bmp(2, 2, 24, &[], &[bottom, top]);
        let img = decode(&bmp, false).unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
        assert_eq!(px(&img, 0, 0), Rgba::new(0, 0, 255, 255));
        assert_eq!(px(&img, 1, 0), Rgba::new(255, 255, 255, 255));
        assert_eq!(px(&img, 0, 1), Rgba::new(255, 0, 0, 255));
        assert_eq!(px(&img, 1, 1), Rgba::new(0, 255, 0, 255));
    }

    #[test]
    fn top_down_32_bit_keeps_alpha() {
        let row: &[u8] = &[1, 2, 3, 4, 5, 6, 7, 8];
        let bmp = build_bmp(2, -1, 32, &[], &[row]);
        let img = decode(&bmp, false).unwrap();
        assert_eq!(px(&img, 0, 0), Rgba::new(3, 2, 1, 4));
        assert_eq!(px(&img, 1, 0), Rgba::new(7, 6, 5, 8));
    }

    #[test]
    fn rgb565_expands_full_scale() {
        let row: &[u8] = &[0x00, 0xF8, 0xFF, 0xFF];
        let bmp = build_bmp(2, 1, 16, &[], &[row]);
        let img = decode(&bmp, false).unwrap();
        assert_eq!(px(&img, 0, 0), Rgba::new(255, 0, 0, 255));
        assert_eq!(px(&img, 1, 0), Rgba::new(255, 255, 255, 255));
    }

    #[test]
    fn four_bit_nibbles() {
        let palette = [BLACK, WHITE, [0, 0, 255, 0]];
        // Pixels 2, 1, 0 then an out-of-palette 15.
        let row: &[u8] = &[0x21, 0x0F, 0, 0];
        let bmp = build_bmp(4, 1, 4, &palette, &[row]);
        let img = decode(&bmp, false).unwrap();
        assert_eq!(px(&img, 0, 0), Rgba::new(255, 0, 0, 255));
        assert_eq!(px(&img, 1, 0), Rgba::new(255, 255, 255, 255));
        assert_eq!(px(&img, 2, 0), Rgba::new(0, 0, 0, 255));
        assert_eq!(px(&img, 3, 0), OPAQUE_BLACK);
    }

    #[test]
    fn eight_bit_indexed() {
        let palette = [BLACK, [10, 20, 30, 0]];
        let row: &[u8] = &[1, 0, 7, 0];
        let bmp = build_bmp(3, 1, 8, &palette, &[row]);
        let img = decode(&bmp, false).unwrap();
        assert_eq!(px(&img, 0, 0), Rgba::new(30, 20, 10, 255));
        assert_eq!(px(&img, 1, 0), Rgba::new(0, 0, 0, 255));
        assert_eq!(px(&img, 2, 0), OPAQUE_BLACK);
    }

    #[test]
    fn one_bit_msb_first() {
        let row: &[u8] = &[0b1000_0000, 0, 0, 0];
        let bmp = build_bmp(2, 2, 1, &[BLACK, WHITE], &[row, row]);
        let img = decode(&bmp, false).unwrap();
        for y in 0..2 {
            assert_eq!(px(&img, 0, y), Rgba::new(255, 255, 255, 255));
            assert_eq!(px(&img, 1, y), Rgba::new(0, 0, 0, 255));
        }
    }

    #[test]
    fn one_bit_inversion_swaps_colors() {
        let row: &[u8] = &[0b1000_0000, 0, 0, 0];
        let bmp = build_bmp(2, 2, 1, &[BLACK, WHITE], &[row, row]);
        let normal = decode(&bmp, false).unwrap();
        let inverted = decode(&bmp, true).unwrap();
        let white = Rgba::new(255, 255, 255, 255);
        let black = Rgba::new(0, 0, 0, 255);
        for y in 0..2 {
            for x in 0..2 {
                let n = px(&normal, x, y);
                let i = px(&inverted, x, y);
                assert_eq!(i, if n == white { black } else { white });
            }
        }
    }

    #[test]
    fn inversion_ignores_other_depths() {
        let row: &[u8] = &[0, 1, 0, 0];
        let bmp = build_bmp(2, 1, 8, &[BLACK, WHITE], &[row]);
        assert_eq!(
            decode(&bmp, true).unwrap().into_buf(),
            decode(&bmp, false).unwrap().into_buf()
        );
    }

    #[test]
    fn missing_palette_defaults_to_monochrome() {
        let mut bmp = build_bmp(1, 1, 1, &[], &[]);
        // Claim two colors that are not present.
        bmp[46..50].copy_from_slice(&2u32.to_le_bytes());
        let palette = Palette::read(&bmp, &BmpHeader::parse(&bmp).unwrap());
        assert_eq!(palette, Palette::monochrome());
    }

    #[test]
    fn huge_palette_count_is_capped() {
        let mut bmp = build_bmp(1, 1, 1, &[BLACK, WHITE, BLACK, WHITE], &[&[0, 0, 0, 0]]);
        bmp[46..50].copy_from_slice(&u32::MAX.to_le_bytes());
        let palette = Palette::read(&bmp, &BmpHeader::parse(&bmp).unwrap());
        assert_eq!(palette.len(), 2);
    }

    #[test]
    fn data_offset_past_end_yields_blank_matrix() {
        let mut bmp = build_bmp(3, 2, 24, &[], &[]);
        bmp[10..14].copy_from_slice(&10_000u32.to_le_bytes());
        let img = decode(&bmp, false).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
        assert!(img.buf().iter().all(|&p| p == TRANSPARENT));
    }

    #[test]
    fn truncated_rows_keep_what_arrived() {
        // Second stored row is missing entirely; first is cut mid-pixel.
        let partial: &[u8] = &[0, 0, 255, 0, 255];
        let bmp = build_bmp(2, -2, 24, &[], &[partial]);
        let img = decode(&bmp, false).unwrap();
        assert_eq!(px(&img, 0, 0), Rgba::new(255, 0, 0, 255));
        assert_eq!(px(&img, 1, 0), TRANSPARENT);
        assert_eq!(px(&img, 0, 1), TRANSPARENT);
    }
}
