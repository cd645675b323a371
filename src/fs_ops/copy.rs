//! Overwriting copy:
//! - Copies to a temp file in the destination directory (fsynced)
//! - Carries the source modification time over
//! - Atomically renames temp -> dest, replacing any existing file

use std::fs::{self, Metadata};
use std::path::Path;
use tracing::debug;

use super::atomic::replace_file;
use super::meta::preserve_mtime;
use super::{io_copy, util};
use crate::errors::MoveError;

/// Copy `src` over `dest`. The destination directory must already exist.
/// Returns the number of bytes copied.
pub fn copy_over(src: &Path, dest: &Path, src_meta: &Metadata) -> Result<u64, MoveError> {
    let dest_dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = util::unique_temp_path(dest_dir);

    let bytes = match io_copy::copy_streaming(src, &tmp_path) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(MoveError::Io {
                op: "copy to temporary file",
                path: src.to_path_buf(),
                source: e,
            });
        }
    };

    if let Err(e) = preserve_mtime(src_meta, &tmp_path) {
        debug!(path = %tmp_path.display(), error = %e, "Could not carry modification time over");
    }

    if let Err(e) = replace_file(&tmp_path, dest) {
        // Best-effort cleanup of the temp file on failure.
        let _ = fs::remove_file(&tmp_path);
        return Err(MoveError::Io {
            op: "rename temporary file over destination",
            path: dest.to_path_buf(),
            source: e,
        });
    }

    Ok(bytes)
}
