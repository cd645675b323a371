//! Integrity-verified single-file move.
//!
//! One attempt is: create the destination directory, check free space, copy
//! over the destination through a temp sibling, digest both files, and only
//! then delete the source. Any failure leaves the source in place.

use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

use super::digest::verify_copy;
use super::task::StagingTask;
use crate::errors::MoveError;
use crate::fs_ops::copy_over;
use crate::platform::available_space;

/// Result of a successful attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Copied, verified, source removed.
    Moved { bytes: u64 },
    /// Source no longer exists; an earlier attempt or duplicate task finished it.
    AlreadyMoved,
    /// Source and destination are the same path.
    InPlace,
    /// Source is no longer a regular file (replaced by a directory or symlink).
    NotAFile,
}

/// Performs one move attempt for a task. The worker pool owns retry policy.
pub trait Relocate: Send + Sync {
    fn relocate(&self, task: &StagingTask) -> Result<MoveOutcome, MoveError>;
}

/// Copy, verify by SHA-256, then delete the source.
#[derive(Debug, Default, Clone, Copy)]
pub struct VerifiedMover;

impl Relocate for VerifiedMover {
    fn relocate(&self, task: &StagingTask) -> Result<MoveOutcome, MoveError> {
        move_verified(task.source_path(), task.destination_path())
    }
}

/// One attempt at moving `src` to `dst`.
pub fn move_verified(src: &Path, dst: &Path) -> Result<MoveOutcome, MoveError> {
    if src == dst {
        return Ok(MoveOutcome::InPlace);
    }

    match attempt(src, dst) {
        Err(MoveError::Io { ref source, .. })
            if source.kind() == io::ErrorKind::NotFound && !src.exists() =>
        {
            // The source vanished mid-attempt, so somebody else moved it.
            debug!(src = %src.display(), "Source disappeared during move");
            Ok(MoveOutcome::AlreadyMoved)
        }
        other => other,
    }
}

fn attempt(src: &Path, dst: &Path) -> Result<MoveOutcome, MoveError> {
    let meta = match fs::symlink_metadata(src) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(MoveOutcome::AlreadyMoved),
        Err(e) => return Err(MoveError::io("stat source", src)(e)),
    };
    if !meta.is_file() {
        return Ok(MoveOutcome::NotAFile);
    }

    let dest_dir = dst.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dest_dir).map_err(MoveError::io("create destination directory", dest_dir))?;
    ensure_space(dest_dir, meta.len())?;

    let bytes = copy_over(src, dst, &meta)?;
    verify_and_release(src, dst)?;

    info!(src = %src.display(), dest = %dst.display(), bytes, "Moved file");
    Ok(MoveOutcome::Moved { bytes })
}

/// Delete `src` only if `dst` holds the same bytes.
pub fn verify_and_release(src: &Path, dst: &Path) -> Result<(), MoveError> {
    verify_copy(src, dst)?;
    match fs::remove_file(src) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MoveError::io("remove source", src)(e)),
    }
}

fn ensure_space(dest_dir: &Path, required: u64) -> Result<(), MoveError> {
    match available_space(dest_dir) {
        Ok(available) if available < required => Err(MoveError::InsufficientSpace {
            required,
            available,
            dest: dest_dir.to_path_buf(),
        }),
        Ok(_) => Ok(()),
        Err(e) => {
            // Unknown free space is not a reason to hold the file back.
            debug!(dir = %dest_dir.display(), error = %e, "Free space query failed");
            Ok(())
        }
    }
}
