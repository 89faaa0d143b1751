//! Caps on what a single decode may read and allocate.
//!
//! Images come from a remote server, so every size field in a header is
//! untrusted. Checks run after the header is probed and before the pixel
//! matrix is allocated.

/// Upper bounds applied while decoding. `None` disables a bound.
///
/// ```
/// use fbrender::ResourceLimits;
///
/// let panel = ResourceLimits::none().with_max_width(1872).with_max_height(1404);
/// assert!(panel.check_dimensions(800, 480).is_ok());
/// assert!(panel.check_dimensions(4000, 480).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ResourceLimits {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Bound on `width * height`.
    pub max_pixels: Option<u64>,
    /// Bound on the encoded input, in bytes.
    pub max_file_size: Option<u64>,
}

impl Default for ResourceLimits {
    /// 16384 × 16384, 64 Mpx, 64 MiB input.
    fn default() -> Self {
        const MIB: u64 = 1024 * 1024;
        Self {
            max_width: Some(16384),
            max_height: Some(16384),
            max_pixels: Some(64 * MIB),
            max_file_size: Some(64 * MIB),
        }
    }
}

impl ResourceLimits {
    /// Every bound disabled.
    pub const fn none() -> Self {
        Self {
            max_width: None,
            max_height: None,
            max_pixels: None,
            max_file_size: None,
        }
    }

    /// Cap the image width.
    pub const fn with_max_width(self, width: u32) -> Self {
        Self {
            max_width: Some(width),
            ..self
        }
    }

    /// Cap the image height.
    pub const fn with_max_height(self, height: u32) -> Self {
        Self {
            max_height: Some(height),
            ..self
        }
    }

    /// Cap `width * height`.
    pub const fn with_max_pixels(self, pixels: u64) -> Self {
        Self {
            max_pixels: Some(pixels),
            ..self
        }
    }

    /// Cap the encoded input size in bytes.
    pub const fn with_max_file_size(self, bytes: u64) -> Self {
        Self {
            max_file_size: Some(bytes),
            ..self
        }
    }

    /// Whether at least one bound is set.
    pub fn has_any(&self) -> bool {
        *self != Self::none()
    }

    /// Width first, then height, then total pixels.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<(), LimitExceeded> {
        if let Some(max) = over(width, self.max_width) {
            return Err(LimitExceeded::Width { actual: width, max });
        }
        if let Some(max) = over(height, self.max_height) {
            return Err(LimitExceeded::Height { actual: height, max });
        }
        let pixels = u64::from(width) * u64::from(height);
        match over(pixels, self.max_pixels) {
            Some(max) => Err(LimitExceeded::Pixels { actual: pixels, max }),
            None => Ok(()),
        }
    }

    /// Check an encoded input of `bytes` against the file size bound.
    pub fn check_file_size(&self, bytes: u64) -> Result<(), LimitExceeded> {
        match over(bytes, self.max_file_size) {
            Some(max) => Err(LimitExceeded::FileSize { actual: bytes, max }),
            None => Ok(()),
        }
    }
}

/// The bound, if `value` is past it.
#[inline]
fn over<T: PartialOrd + Copy>(value: T, bound: Option<T>) -> Option<T> {
    bound.filter(|&max| value > max)
}

/// Which bound a decode ran into, with the offending value.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum LimitExceeded {
    #[error("width {actual} exceeds limit {max}")]
    Width { actual: u32, max: u32 },

    #[error("height {actual} exceeds limit {max}")]
    Height { actual: u32, max: u32 },

    #[error("pixel count {actual} exceeds limit {max}")]
    Pixels { actual: u64, max: u64 },

    #[error("file size {actual} bytes exceeds limit {max}")]
    FileSize { actual: u64, max: u64 },
}
