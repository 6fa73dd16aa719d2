//! Filesystem utilities for cross-device file moves.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Attempts a fast rename first; on EXDEV falls back to copying into a
/// temp file next to the destination and renaming it into place, so the
/// destination never observes a partial file.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename, falling back to copy: {} -> {}",
                src.display(),
                dst.display()
            );

            let tmp_dst = dst.with_extension("tmp");
            fs::copy(src, &tmp_dst).await?;
            if let Err(e) = fs::rename(&tmp_dst, dst).await {
                let _ = fs::remove_file(&tmp_dst).await;
                return Err(MediaError::from(e));
            }

            // Source removal is best effort.
            if let Err(e) = fs::remove_file(src).await {
                tracing::warn!("Failed to remove moved source {}: {}", src.display(), e);
            }
            Ok(())
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}
