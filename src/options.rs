//! Render configuration.

use std::path::{Path, PathBuf};

use crate::depth::ColorDepth;
use crate::framebuffer::{self, DEFAULT_DEVICE};
use crate::limits::ResourceLimits;

/// Where and how to render.
///
/// # Example
///
/// ```
/// use fbrender::{ColorDepth, RenderOptions};
///
/// let options = RenderOptions::default()
///     .with_device("/dev/fb1")
///     .with_forced_depth(ColorDepth::Bpp16)
///     .with_dark_mode(true);
/// assert_eq!(options.sysfs_dir().to_str(), Some("/sys/class/graphics/fb1"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct RenderOptions {
    /// Framebuffer device node.
    pub device: PathBuf,
    /// Geometry attribute directory. Derived from `device` when `None`.
    pub sysfs_dir: Option<PathBuf>,
    /// Depth to use instead of the probed one.
    pub forced_depth: Option<ColorDepth>,
    /// Swap the two palette entries of 1-bit BMPs.
    pub dark_mode: bool,
    pub limits: ResourceLimits,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            sysfs_dir: None,
            forced_depth: None,
            dark_mode: false,
            limits: ResourceLimits::default(),
        }
    }
}

impl RenderOptions {
    /// Render to `device` instead of `/dev/fb0`.
    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }

    /// Read geometry from `dir` instead of the device's sysfs node.
    pub fn with_sysfs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sysfs_dir = Some(dir.into());
        self
    }

    /// Pack pixels at `depth` regardless of what sysfs reports.
    pub fn with_forced_depth(mut self, depth: ColorDepth) -> Self {
        self.forced_depth = Some(depth);
        self
    }

    /// Invert 1-bit images.
    pub fn with_dark_mode(mut self, dark_mode: bool) -> Self {
        self.dark_mode = dark_mode;
        self
    }

    /// Replace the decode limits.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The sysfs directory geometry is probed from.
    pub fn sysfs_dir(&self) -> PathBuf {
        match &self.sysfs_dir {
            Some(dir) => dir.clone(),
            None => framebuffer::sysfs_dir_for(&self.device),
        }
    }

    /// The framebuffer device node.
    pub fn device(&self) -> &Path {
        &self.device
    }
}
