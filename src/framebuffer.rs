//! Memory-mapped Linux framebuffer devices.
//!
//! A [`Framebuffer`] is opened in two steps: [`Framebuffer::open`] opens the
//! device node and probes its geometry from sysfs, then
//! [`Framebuffer::map_memory`] maps `stride * height` bytes shared with the
//! driver. [`Framebuffer::open_mapped`] does both.
//!
//! Geometry comes from the text attributes the fbdev driver exports under
//! `/sys/class/graphics/fbN/`:
//!
//! - `bits_per_pixel`: `16`, `24` or `32`
//! - `virtual_size`: `W,H`
//! - `stride`: bytes per row (optional; defaults to `W * bpp / 8`)

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use alloc::vec::Vec;

use rgb::Rgba;

use crate::depth::ColorDepth;
use crate::error::SurfaceError;
use crate::geometry::Rect;
use crate::surface::{Geometry, Surface};

/// Device used when none is configured.
pub const DEFAULT_DEVICE: &str = "/dev/fb0";

const SYSFS_GRAPHICS: &str = "/sys/class/graphics";

/// An open framebuffer device.
///
/// Pixel access before [`map_memory`](Self::map_memory) or after
/// [`close`](Self::close) behaves as if every pixel were out of range.
/// Dropping the framebuffer unmaps and closes it.
pub struct Framebuffer {
    path: PathBuf,
    file: Option<File>,
    map: Option<Mapping>,
    geometry: Geometry,
}

impl Framebuffer {
    /// Open `device` and probe its geometry from the matching sysfs directory.
    ///
    /// If `forced_depth` differs from the probed depth it wins, and the stride
    /// is recomputed as `width * bytes_per_pixel`.
    pub fn open(
        device: impl AsRef<Path>,
        forced_depth: Option<ColorDepth>,
    ) -> Result<Self, SurfaceError> {
        let device = device.as_ref();
        Self::open_with_sysfs(device, sysfs_dir_for(device), forced_depth)
    }

    /// [`open`](Self::open) with an explicit sysfs attribute directory.
    pub fn open_with_sysfs(
        device: impl AsRef<Path>,
        sysfs_dir: impl AsRef<Path>,
        forced_depth: Option<ColorDepth>,
    ) -> Result<Self, SurfaceError> {
        let path = device.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| SurfaceError::DeviceUnavailable {
                path: path.clone(),
                source,
            })?;

        let mut geometry = probe_geometry(sysfs_dir.as_ref())?;
        log::info!(
            "framebuffer detected: {}x{}, {}, stride: {}",
            geometry.width,
            geometry.height,
            geometry.depth,
            geometry.stride
        );

        if let Some(depth) = forced_depth
            && depth != geometry.depth
        {
            log::info!(
                "overriding detected color depth {} with forced depth {}",
                geometry.depth,
                depth
            );
            geometry = Geometry::packed(geometry.width, geometry.height, depth);
        }

        Ok(Self {
            path,
            file: Some(file),
            map: None,
            geometry,
        })
    }

    /// Open and map in one step.
    pub fn open_mapped(
        device: impl AsRef<Path>,
        forced_depth: Option<ColorDepth>,
    ) -> Result<Self, SurfaceError> {
        let mut fb = Self::open(device, forced_depth)?;
        fb.map_memory()?;
        Ok(fb)
    }

    /// Map `stride * height` bytes of the device read-write and shared.
    ///
    /// Calling this on an already-mapped framebuffer does nothing.
    pub fn map_memory(&mut self) -> Result<(), SurfaceError> {
        if self.map.is_some() {
            return Ok(());
        }
        let len = self.geometry.byte_len();
        let Some(file) = &self.file else {
            return Err(SurfaceError::MappingFailed {
                len,
                source: io::Error::other("device is closed"),
            });
        };
        self.map = Some(Mapping::new(file, len)?);
        Ok(())
    }

    /// Unmap and close the device. Safe to call more than once.
    pub fn close(&mut self) {
        if self.map.take().is_some() {
            log::debug!("unmapped {}", self.path.display());
        }
        self.file = None;
    }

    /// Whether device memory is currently mapped.
    pub fn is_mapped(&self) -> bool {
        self.map.is_some()
    }

    /// Layout read from sysfs when the device was opened.
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Device node this framebuffer was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bytes(&self) -> &[u8] {
        match &self.map {
            Some(m) => m.as_slice(),
            None => &[],
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.map {
            Some(m) => m.as_mut_slice(),
            None => &mut [],
        }
    }
}

impl Surface for Framebuffer {
    fn bounds(&self) -> Rect {
        self.geometry.bounds()
    }

    fn get(&self, x: i32, y: i32) -> Rgba<u8> {
        self.geometry.read(self.bytes(), x, y)
    }

    fn set(&mut self, x: i32, y: i32, c: Rgba<u8>) {
        let geometry = self.geometry;
        geometry.write(self.bytes_mut(), x, y, c);
    }

    /// `msync` the mapping. No-op when unmapped.
    fn flush(&mut self) -> Result<(), SurfaceError> {
        match &self.map {
            Some(m) => m.sync(),
            None => Ok(()),
        }
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.close();
    }
}

impl core::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("path", &self.path)
            .field("geometry", &self.geometry)
            .field("open", &self.file.is_some())
            .field("mapped", &self.map.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// A `MAP_SHARED` region, unmapped on drop.
struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
}

impl Mapping {
    fn new(file: &File, len: usize) -> Result<Self, SurfaceError> {
        // SAFETY: a fresh mapping chosen by the kernel; no existing memory
        // is aliased. The fd stays valid for the duration of the call.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(SurfaceError::MappingFailed {
                len,
                source: io::Error::last_os_error(),
            });
        }
        let ptr = NonNull::new(ptr.cast::<u8>()).ok_or_else(|| SurfaceError::MappingFailed {
            len,
            source: io::Error::other("mmap returned null"),
        })?;
        Ok(Self { ptr, len })
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr..ptr+len` is mapped for as long as `self` lives.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` guarantees no other slice is live.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    fn sync(&self) -> Result<(), SurfaceError> {
        // SAFETY: the range is exactly the region returned by mmap.
        let rc = unsafe { libc::msync(self.ptr.as_ptr().cast(), self.len, libc::MS_SYNC) };
        if rc != 0 {
            return Err(SurfaceError::SyncFailed(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: unmapping the region created in `new`; no slices outlive
        // `self`.
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast(), self.len);
        }
    }
}

// ---------------------------------------------------------------------------
// sysfs probing
// ---------------------------------------------------------------------------

/// `/dev/fb1` → `/sys/class/graphics/fb1`.
pub fn sysfs_dir_for(device: &Path) -> PathBuf {
    let name = device
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "fb0".into());
    Path::new(SYSFS_GRAPHICS).join(name)
}

/// Read geometry from an fbdev sysfs directory.
pub fn probe_geometry(sysfs_dir: &Path) -> Result<Geometry, SurfaceError> {
    let bpp_path = sysfs_dir.join("bits_per_pixel");
    let bits: u32 = parse_attr(&bpp_path, "bits_per_pixel")?;
    let depth = ColorDepth::from_bits(bits).ok_or(SurfaceError::UnsupportedDepth { bits })?;

    let size_path = sysfs_dir.join("virtual_size");
    let size = read_attr(&size_path, "virtual_size")?;
    let parts: Vec<&str> = size.split(',').map(str::trim).collect();
    let [w, h] = parts.as_slice() else {
        return Err(unreadable("virtual_size", &size_path, "expected W,H"));
    };
    let width: u32 = w
        .parse()
        .map_err(|e| unreadable("width", &size_path, e))?;
    let height: u32 = h
        .parse()
        .map_err(|e| unreadable("height", &size_path, e))?;

    let packed = Geometry::packed(width, height, depth);
    let stride_path = sysfs_dir.join("stride");
    let stride = if stride_path.exists() {
        parse_attr::<usize>(&stride_path, "stride")?
    } else {
        packed.stride
    };
    if stride < packed.stride {
        return Err(unreadable(
            "stride",
            &stride_path,
            format_args!("{stride} is smaller than a row of {} bytes", packed.stride),
        ));
    }

    Ok(Geometry { stride, ..packed })
}

/// Framebuffer device nodes under `/dev`, sorted.
pub fn list_devices() -> Vec<PathBuf> {
    list_devices_in(Path::new("/dev"))
}

/// Entries of `dir` named `fb` followed by digits, sorted. Empty if `dir`
/// cannot be read.
pub fn list_devices_in(dir: &Path) -> Vec<PathBuf> {
    let mut devices: Vec<PathBuf> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.strip_prefix("fb")
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
        .map(|entry| entry.path())
        .collect();
    devices.sort();
    devices
}

fn read_attr(path: &Path, what: &'static str) -> Result<String, SurfaceError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_owned())
        .map_err(|e| unreadable(what, path, e))
}

fn parse_attr<T>(path: &Path, what: &'static str) -> Result<T, SurfaceError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    read_attr(path, what)?
        .parse()
        .map_err(|e| unreadable(what, path, e))
}

fn unreadable(what: &'static str, path: &Path, reason: impl core::fmt::Display) -> SurfaceError {
    SurfaceError::GeometryUnreadable {
        what,
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
