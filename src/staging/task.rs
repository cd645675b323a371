//! One unit of work: a single file to relocate.

use std::path::{Path, PathBuf};

use crate::errors::StagingError;

/// Immutable pair of source and destination paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagingTask {
    source_path: PathBuf,
    destination_path: PathBuf,
}

impl StagingTask {
    /// Both paths must be non-empty.
    pub fn new(
        source_path: impl Into<PathBuf>,
        destination_path: impl Into<PathBuf>,
    ) -> Result<Self, StagingError> {
        let source_path = source_path.into();
        let destination_path = destination_path.into();
        if source_path.as_os_str().is_empty() {
            return Err(StagingError::EmptyField { field: "source_path" });
        }
        if destination_path.as_os_str().is_empty() {
            return Err(StagingError::EmptyField { field: "destination_path" });
        }
        Ok(Self {
            source_path,
            destination_path,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_paths_are_rejected() {
        assert!(matches!(
            StagingTask::new("", "/dst/a"),
            Err(StagingError::EmptyField { field: "source_path" })
        ));
        assert!(matches!(
            StagingTask::new("/src/a", ""),
            Err(StagingError::EmptyField { field: "destination_path" })
        ));
        let t = StagingTask::new("/src/a", "/dst/a").unwrap();
        assert_eq!(t.source_path(), Path::new("/src/a"));
        assert_eq!(t.destination_path(), Path::new("/dst/a"));
    }
}
