//! Render still images onto memory-mapped Linux framebuffers.
//!
//! The pieces, in pipeline order:
//!
//! - [`DeviceLock`] / [`LockToken`]: PID-file lock giving one process the device
//! - [`decode`]: two-tier decoding into an `ImgVec<Rgba<u8>>`, with the
//!   [`bmp`] parser as fallback for files the `image` crate rejects
//! - [`compose::render`]: nearest-neighbor stretch onto any [`Surface`]
//! - [`Framebuffer`]: a [`Surface`] over `/dev/fbN` in 16, 24 or 32 bpp
//!
//! [`render::display_image`] runs the whole cycle. [`MemorySurface`] stands in
//! for a device in tests and off-screen rendering.
//!
//! ```no_run
//! use fbrender::{DeviceLock, RenderOptions, render};
//!
//! let lock = DeviceLock::default().acquire()?;
//! let options = RenderOptions::default().with_dark_mode(true);
//! render::display_image("/tmp/screen.bmp", &options, &lock)?;
//! # Ok::<(), fbrender::Error>(())
//! ```
//!
//! Nothing here installs a logger; diagnostics go through the `log` facade.

extern crate alloc;

pub mod bmp;
pub mod compose;
pub mod decode;
mod depth;
mod error;
mod format;
pub mod framebuffer;
mod geometry;
mod limits;
pub mod lock;
mod options;
pub mod render;
mod surface;

pub use depth::{ColorDepth, rgb565_to_rgba, rgba_to_rgb565};
pub use error::{BmpError, DecodeError, Error, ErrorKind, LockError, Result, SurfaceError};
pub use format::ImageFormat;
pub use framebuffer::Framebuffer;
pub use geometry::Rect;
pub use limits::{LimitExceeded, ResourceLimits};
pub use lock::{DeviceLock, LockToken};
pub use options::RenderOptions;
pub use surface::{BLACK, Geometry, MemorySurface, Surface, SurfaceView, TRANSPARENT};

// Re-exports for callers handling decoded matrices.
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb;
pub use rgb::Rgba;
