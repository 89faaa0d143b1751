//! Two-tier image decoding.
//!
//! Files go through the `image` crate first. If that fails and the file is a
//! BMP, the byte-level parser in [`crate::bmp`] gets a second attempt. A
//! 1-bit BMP with monochrome inversion requested skips the first tier, since
//! the general decoder has no way to swap the palette.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use alloc::vec::Vec;

use imgref::ImgVec;
use rgb::Rgba;

use crate::bmp::{self, BmpHeader};
use crate::error::{BmpError, DecodeError};
use crate::format::ImageFormat;
use crate::limits::ResourceLimits;

/// Read and decode the image at `path`.
///
/// The file size is checked against `limits` before it is read.
pub fn decode_file(
    path: impl AsRef<Path>,
    invert_monochrome: bool,
    limits: &ResourceLimits,
) -> Result<ImgVec<Rgba<u8>>, DecodeError> {
    let path = path.as_ref();
    let read_err = |source| DecodeError::Read {
        path: path.to_path_buf(),
        source,
    };

    let len = fs::metadata(path).map_err(read_err)?.len();
    limits.check_file_size(len)?;
    let data = fs::read(path).map_err(read_err)?;
    log::debug!("read {} bytes from {}", data.len(), path.display());

    decode_bytes(&data, invert_monochrome, limits)
}

/// Decode an in-memory image.
pub fn decode_bytes(
    data: &[u8],
    invert_monochrome: bool,
    limits: &ResourceLimits,
) -> Result<ImgVec<Rgba<u8>>, DecodeError> {
    limits.check_file_size(data.len() as u64)?;
    let format = ImageFormat::detect(data).ok_or(DecodeError::UnknownFormat)?;
    log::debug!("detected image format: {format}");

    if format == ImageFormat::Bmp && invert_monochrome && is_monochrome_bmp(data) {
        log::debug!("1-bit BMP with inversion requested; using fallback parser");
        return bmp::decode_with_limits(data, true, limits).map_err(fallback_only);
    }

    match decode_general(data, format, limits) {
        Err(DecodeError::Image { format, source }) if format.has_fallback() => {
            log::info!("standard {format} decoder failed: {source}; trying fallback parser");
            match bmp::decode_with_limits(data, invert_monochrome, limits) {
                Ok(img) => {
                    log::info!("decoded image with fallback BMP parser");
                    Ok(img)
                }
                Err(BmpError::Limit(e)) => Err(DecodeError::Limit(e)),
                Err(fallback) => Err(DecodeError::Both {
                    primary: source,
                    fallback,
                }),
            }
        }
        other => other,
    }
}

fn decode_general(
    data: &[u8],
    format: ImageFormat,
    limits: &ResourceLimits,
) -> Result<ImgVec<Rgba<u8>>, DecodeError> {
    let image_err = |source| DecodeError::Image { format, source };
    let reader = || image::ImageReader::with_format(Cursor::new(data), format.to_image_crate());

    let (width, height) = reader().into_dimensions().map_err(image_err)?;
    limits.check_dimensions(width, height)?;

    let rgba = reader().decode().map_err(image_err)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels: Vec<Rgba<u8>> = rgba
        .into_raw()
        .chunks_exact(4)
        .map(|p| Rgba::new(p[0], p[1], p[2], p[3]))
        .collect();
    log::debug!("decoded {format} image: {width}x{height}");

    Ok(ImgVec::new(pixels, width as usize, height as usize))
}

fn is_monochrome_bmp(data: &[u8]) -> bool {
    BmpHeader::parse(data).is_ok_and(|h| h.bits_per_pixel == 1)
}

fn fallback_only(e: BmpError) -> DecodeError {
    match e {
        BmpError::Limit(l) => DecodeError::Limit(l),
        other => DecodeError::Bmp(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bmp::tests::build_bmp;
    use crate::surface::TRANSPARENT;

    const BLACK: [u8; 4] = [0, 0, 0, 0];
    const WHITE: [u8; 4] = [255, 255, 255, 0];

    fn px(img: &ImgVec<Rgba<u8>>, x: usize, y: usize) -> Rgba<u8> {
        img.buf()[y * img.stride() + x]
    }

    fn mono_2x2() -> Vec<u8> {
        let row: &[u8] = &[0b1000_0000, 0, 0, 0];
        build_bmp(2, 2, 1, &[BLACK, WHITE], &[row, row])
    }

    #[test]
    fn unknown_format() {
        assert!(matches!(
            decode_bytes(b"not an image", false, &ResourceLimits::none()),
            Err(DecodeError::UnknownFormat)
        ));
    }

    #[test]
    fn standard_decoder_handles_plain_bmp() {
        let bottom: &[u8] = &[0, 0, 255, 0, 255, 0, 0, 0];
        let top: &[u8] = &[255, 0, 0, 255, 255, 255, 0, 0];
        let bmp = build_bmp(2, 2, 24, &[], &[bottom, top]);
        let img = decode_bytes(&bmp, false, &ResourceLimits::default()).unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
        assert_eq!(px(&img, 0, 0), Rgba::new(0, 0, 255, 255));
        assert_eq!(px(&img, 1, 0), Rgba::new(255, 255, 255, 255));
        assert_eq!(px(&img, 0, 1), Rgba::new(255, 0, 0, 255));
        assert_eq!(px(&img, 1, 1), Rgba::new(0, 255, 0, 255));
    }

    #[test]
    fn truncated_bmp_falls_back() {
        // Only the bottom row is present.
        let bottom: &[u8] = &[0, 0, 255, 0, 255, 0, 0, 0];
        let bmp = build_bmp(2, 2, 24, &[], &[bottom]);
        let img = decode_bytes(&bmp, false, &ResourceLimits::none()).unwrap();
        assert_eq!(px(&img, 0, 1), Rgba::new(255, 0, 0, 255));
        assert_eq!(px(&img, 1, 1), Rgba::new(0, 255, 0, 255));
        assert_eq!(px(&img, 0, 0), TRANSPARENT);
        assert_eq!(px(&img, 1, 0), TRANSPARENT);
    }

    #[test]
    fn both_decoders_failing_is_combined() {
        let err = decode_bytes(b"BM\0\0\0\0\0\0\0\0", false, &ResourceLimits::none()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Both {
                fallback: BmpError::TruncatedHeader { .. },
                ..
            }
        ));
        assert!(err.to_string().starts_with("both standard and fallback"));
    }

    #[test]
    fn broken_png_has_no_fallback() {
        let err = decode_bytes(
            &[0x89, 0x50, 0x4E, 0x47, 0, 0, 0, 0],
            false,
            &ResourceLimits::none(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Image {
                format: ImageFormat::Png,
                ..
            }
        ));
    }

    #[test]
    fn dark_mode_swaps_monochrome() {
        let bmp = mono_2x2();
        let normal = decode_bytes(&bmp, false, &ResourceLimits::none()).unwrap();
        let dark = decode_bytes(&bmp, true, &ResourceLimits::none()).unwrap();
        assert_eq!(px(&normal, 0, 0), Rgba::new(255, 255, 255, 255));
        assert_eq!(px(&normal, 1, 0), Rgba::new(0, 0, 0, 255));
        assert_eq!(px(&dark, 0, 0), Rgba::new(0, 0, 0, 255));
        assert_eq!(px(&dark, 1, 0), Rgba::new(255, 255, 255, 255));
    }

    #[test]
    fn file_size_limit() {
        let bmp = mono_2x2();
        let limits = ResourceLimits::none().with_max_file_size(8);
        assert!(matches!(
            decode_bytes(&bmp, false, &limits),
            Err(DecodeError::Limit(_))
        ));
    }

    #[test]
    fn dimension_limit_on_standard_path() {
        let row: &[u8] = &[0; 12];
        let bmp = build_bmp(4, 2, 24, &[], &[row, row]);
        let limits = ResourceLimits::none().with_max_width(3);
        assert!(matches!(
            decode_bytes(&bmp, false, &limits),
            Err(DecodeError::Limit(_))
        ));
    }

    #[test]
    fn decode_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.bmp");
        fs::write(&path, mono_2x2()).unwrap();
        let img = decode_file(&path, true, &ResourceLimits::default()).unwrap();
        assert_eq!(px(&img, 0, 0), Rgba::new(0, 0, 0, 255));

        assert!(matches!(
            decode_file(dir.path().join("missing.bmp"), false, &ResourceLimits::none()),
            Err(DecodeError::Read { .. })
        ));
    }
}
