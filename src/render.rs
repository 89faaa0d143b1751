//! One full render cycle: decode a file and paint it on the device.

use std::path::Path;

use crate::compose;
use crate::decode;
use crate::error::{LockError, Result};
use crate::framebuffer::Framebuffer;
use crate::lock::LockToken;
use crate::options::RenderOptions;
use crate::surface::{BLACK, Surface};

/// Decode the image at `path` and stretch it over the whole framebuffer.
///
/// The image is decoded before the device is opened, so a bad file leaves
/// the screen untouched. The device is unmapped and closed on return.
///
/// Fails with [`LockError::Released`] if `lock` has already been released.
pub fn display_image(
    path: impl AsRef<Path>,
    options: &RenderOptions,
    lock: &LockToken,
) -> Result<()> {
    let path = path.as_ref();
    log::debug!("reading image from {}", path.display());
    let image = decode::decode_file(path, options.dark_mode, &options.limits)?;

    let mut fb = open(options, lock)?;
    compose::render(image.as_ref(), &mut fb)?;
    log::info!(
        "drew {}x{} image to {} ({})",
        image.width(),
        image.height(),
        fb.path().display(),
        fb.bounds()
    );
    Ok(())
}

/// Paint the whole framebuffer black.
///
/// Like [`display_image`], fails with [`LockError::Released`] if `lock` has
/// already been released.
pub fn clear_device(options: &RenderOptions, lock: &LockToken) -> Result<()> {
    let mut fb = open(options, lock)?;
    fb.fill(BLACK);
    fb.flush()?;
    log::info!("cleared {}", fb.path().display());
    Ok(())
}

fn open(options: &RenderOptions, lock: &LockToken) -> Result<Framebuffer> {
    if lock.is_released() {
        return Err(LockError::Released {
            path: lock.path().to_path_buf(),
        }
        .into());
    }
    log::debug!(
        "opening {} under lock {}",
        options.device.display(),
        lock.path().display()
    );
    let mut fb =
        Framebuffer::open_with_sysfs(&options.device, options.sysfs_dir(), options.forced_depth)?;
    fb.map_memory()?;
    Ok(fb)
}
