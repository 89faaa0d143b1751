//! Container sniffing by leading bytes.

/// Containers the decoder accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
}

/// Signatures, checked in order.
const SIGNATURES: &[(&[u8], ImageFormat)] = &[
    (&[0xFF, 0xD8], ImageFormat::Jpeg),
    (&[0x89, b'P', b'N', b'G'], ImageFormat::Png),
    (b"GIF", ImageFormat::Gif),
    (b"BM", ImageFormat::Bmp),
];

impl ImageFormat {
    /// Identify `data` from its first few bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        SIGNATURES
            .iter()
            .find(|(magic, _)| data.starts_with(magic))
            .map(|&(_, format)| format)
    }

    /// Whether [`crate::bmp`] can retry files of this format that the
    /// `image` crate rejects.
    pub fn has_fallback(self) -> bool {
        self == ImageFormat::Bmp
    }

    pub(crate) fn to_image_crate(self) -> image::ImageFormat {
        match self {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Bmp => "BMP",
        }
    }
}

impl core::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
