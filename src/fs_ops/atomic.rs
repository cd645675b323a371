//! Atomic rename helper.
//! - Renames a finished temp copy over the destination (std replaces an existing file on every platform).
//! - On Unix, best-effort fsync of the destination directory after rename.

use std::fs;
use std::io;
use std::path::Path;

pub(super) fn replace_file(tmp: &Path, dst: &Path) -> io::Result<()> {
    fs::rename(tmp, dst)?;

    // Ignore fsync errors to avoid turning a successful rename into a failure.
    #[cfg(unix)]
    if let Some(parent) = dst.parent() {
        let _ = super::util::fsync_dir(parent);
    }

    Ok(())
}
