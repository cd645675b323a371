//! Startup reconciliation.
//! Removes temp copies left in destination trees by an interrupted run, so a
//! crash mid-copy never leaves stray hidden files behind.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Location;
use crate::fs_ops::is_staging_temp;

/// Delete orphaned temp files under every destination root. Returns how many
/// were removed. Must run before any worker starts copying.
pub fn reconcile(locations: &[Location]) -> usize {
    let roots: BTreeSet<PathBuf> = locations
        .iter()
        .filter(|l| !l.is_identity())
        .map(|l| l.destination().to_path_buf())
        .collect();

    let mut removed = 0;
    for root in &roots {
        for entry in WalkDir::new(root).follow_links(false).into_iter().flatten() {
            let p = entry.path();
            if !entry.file_type().is_file() || !is_staging_temp(p) {
                continue;
            }
            match fs::remove_file(p) {
                Ok(()) => {
                    debug!(path = %p.display(), "Removed orphan temp copy");
                    removed += 1;
                }
                Err(e) => warn!(error = %e, path = %p.display(), "Failed to remove orphan temp copy"),
            }
        }
    }
    if removed > 0 {
        info!(removed, "Cleaned up temp copies from an earlier run");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn removes_only_staging_temps() {
        let td = tempdir().unwrap();
        let src = td.path().join("src");
        let dst = td.path().join("dst");
        let nested = dst.join("deep");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&nested).unwrap();
        let orphan = nested.join(".backup_staging.123.456.0.tmp");
        let keep = nested.join("report.tmp");
        fs::write(&orphan, b"partial").unwrap();
        fs::write(&keep, b"real").unwrap();
        // Sources are never touched.
        let src_temp = src.join(".backup_staging.1.2.3.tmp");
        fs::write(&src_temp, b"staged").unwrap();

        let loc = Location::new(&src, &dst).unwrap();
        assert_eq!(reconcile(&[loc]), 1);
        assert!(!orphan.exists());
        assert!(keep.exists());
        assert!(src_temp.exists());
    }
}
