//! Error types.
//!
//! Each stage of the pipeline has its own error enum; [`Error`] wraps them
//! for callers that drive the whole render cycle. None of these are retried
//! inside the crate: a failed render is reported and the caller decides
//! when to try again.

use std::io;
use std::path::PathBuf;

use crate::ImageFormat;
use crate::limits::LimitExceeded;

/// Errors from opening, mapping, or syncing a framebuffer device.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum SurfaceError {
    #[error("failed to open framebuffer device {path}: {source}")]
    DeviceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported color depth: {bits} bits")]
    UnsupportedDepth { bits: u32 },

    #[error("failed to read {what} from {path}: {reason}")]
    GeometryUnreadable {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("failed to mmap {len} bytes of framebuffer: {source}")]
    MappingFailed {
        len: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to sync framebuffer: {0}")]
    SyncFailed(#[source] io::Error),
}

/// Errors from the fallback BMP parser.
///
/// Truncated pixel data is not an error; see [`bmp::decode`](crate::bmp::decode).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BmpError {
    #[error("invalid BMP signature")]
    InvalidSignature,

    #[error("BMP header truncated: {len} bytes, need {needed}")]
    TruncatedHeader { len: usize, needed: usize },

    #[error("unsupported BMP bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("BMP has zero width or height")]
    EmptyImage,

    #[error("BMP of {width}x{height} pixels cannot be allocated")]
    TooLarge { width: u32, height: u32 },

    #[error(transparent)]
    Limit(#[from] LimitExceeded),
}

/// Errors from turning a file into a pixel matrix.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unrecognized image format")]
    UnknownFormat,

    #[error("error decoding image format '{format}': {source}")]
    Image {
        format: ImageFormat,
        #[source]
        source: image::ImageError,
    },

    #[error("both standard and fallback BMP decoders failed: {primary}; {fallback}")]
    Both {
        primary: image::ImageError,
        fallback: BmpError,
    },

    #[error(transparent)]
    Bmp(#[from] BmpError),

    #[error(transparent)]
    Limit(#[from] LimitExceeded),
}

/// Errors from the device lock.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum LockError {
    #[error("framebuffer is currently in use by process {0}")]
    DeviceBusy(u32),

    #[error("lost framebuffer lock {path}: token already released")]
    Released { path: PathBuf },

    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Coarse classification of [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    DeviceUnavailable,
    UnsupportedDepth,
    GeometryUnreadable,
    MappingFailed,
    InvalidSignature,
    UnsupportedBitDepth,
    DeviceBusy,
    /// Any other decode failure, including both decoders rejecting the file.
    Decode,
    /// A [`ResourceLimits`](crate::ResourceLimits) check failed.
    Limit,
    /// Filesystem or syscall failure outside the categories above.
    Io,
}

/// Any failure of a render cycle.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl From<BmpError> for Error {
    fn from(e: BmpError) -> Self {
        Error::Decode(DecodeError::Bmp(e))
    }
}

impl Error {
    /// Map onto the taxonomy callers use to decide on logging and backoff.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Surface(e) => match e {
                SurfaceError::DeviceUnavailable { .. } => ErrorKind::DeviceUnavailable,
                SurfaceError::UnsupportedDepth { .. } => ErrorKind::UnsupportedDepth,
                SurfaceError::GeometryUnreadable { .. } => ErrorKind::GeometryUnreadable,
                SurfaceError::MappingFailed { .. } => ErrorKind::MappingFailed,
                SurfaceError::SyncFailed(_) => ErrorKind::Io,
            },
            Error::Decode(e) => match e {
                DecodeError::Bmp(b) => bmp_kind(b),
                DecodeError::Limit(_) => ErrorKind::Limit,
                DecodeError::Read { .. } => ErrorKind::Io,
                DecodeError::UnknownFormat
                | DecodeError::Image { .. }
                | DecodeError::Both { .. } => ErrorKind::Decode,
            },
            Error::Lock(e) => match e {
                LockError::DeviceBusy(_) | LockError::Released { .. } => ErrorKind::DeviceBusy,
                LockError::Io { .. } => ErrorKind::Io,
            },
        }
    }
}

fn bmp_kind(e: &BmpError) -> ErrorKind {
    match e {
        BmpError::InvalidSignature => ErrorKind::InvalidSignature,
        BmpError::UnsupportedBitDepth(_) => ErrorKind::UnsupportedBitDepth,
        BmpError::Limit(_) | BmpError::TooLarge { .. } => ErrorKind::Limit,
        BmpError::TruncatedHeader { .. } | BmpError::EmptyImage => ErrorKind::Decode,
    }
}

/// Result alias defaulting to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;
