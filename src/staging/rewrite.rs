//! Source path -> destination path mapping.
//!
//! The source root is swapped for the destination root component-wise, then
//! every replacement of the location runs in declared order as a literal
//! substring substitution over the whole candidate path. Later replacements
//! see the output of earlier ones.

use std::path::{Path, PathBuf};

use crate::config::Location;
use crate::errors::StagingError;

/// Map `full_source_path` into the destination tree of `location`.
///
/// Paths that are not under `location.source()` are rejected with
/// [`StagingError::OutsideSource`] rather than passed through.
pub fn rewrite(location: &Location, full_source_path: &Path) -> Result<PathBuf, StagingError> {
    let relative = full_source_path
        .strip_prefix(location.source())
        .map_err(|_| StagingError::OutsideSource {
            path: full_source_path.to_path_buf(),
            root: location.source().to_path_buf(),
        })?;

    let candidate = if relative.as_os_str().is_empty() {
        location.destination().to_path_buf()
    } else {
        location.destination().join(relative)
    };

    if location.replacements().is_empty() {
        return Ok(candidate);
    }

    let mut rewritten = candidate
        .to_str()
        .ok_or_else(|| StagingError::NonUtf8Path(full_source_path.to_path_buf()))?
        .to_owned();
    for r in location.replacements() {
        rewritten = rewritten.replace(r.source_name(), r.destination_name());
    }
    Ok(PathBuf::from(rewritten))
}
