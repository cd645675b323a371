//! Empty directory reaper.
//!
//! Periodically walks each source root depth-first and removes subdirectories
//! that are empty and have not been modified for `staleness`. The root itself
//! is never removed and symlinked directories are never entered.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::shutdown::StopSignal;

/// Counts from one sweep of one root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub visited: usize,
    pub removed: usize,
}

impl std::ops::AddAssign for ReapReport {
    fn add_assign(&mut self, rhs: Self) {
        self.visited += rhs.visited;
        self.removed += rhs.removed;
    }
}

/// Remove empty, stale directories below `root`.
///
/// A directory's age is taken before its children are processed, so a parent
/// emptied during this sweep is judged by its own earlier mtime.
pub fn reap_empty_dirs(root: &Path, staleness: Duration) -> ReapReport {
    let mut report = ReapReport::default();
    let now = SystemTime::now();
    reap_children(root, staleness, now, &mut report);
    report
}

fn reap_children(dir: &Path, staleness: Duration, now: SystemTime, report: &mut ReapReport) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Cannot list directory");
            }
            return;
        }
    };

    for entry in entries.flatten() {
        // DirEntry::file_type does not follow symlinks.
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => {}
            _ => continue,
        }
        let path = entry.path();
        let modified = entry.metadata().and_then(|m| m.modified()).ok();

        report.visited += 1;
        reap_children(&path, staleness, now, report);

        if is_stale(modified, now, staleness) && is_empty_dir(&path) && remove_empty(&path) {
            report.removed += 1;
        }
    }
}

fn is_stale(modified: Option<SystemTime>, now: SystemTime, staleness: Duration) -> bool {
    match modified {
        // A timestamp in the future counts as fresh.
        Some(m) => now.duration_since(m).map(|age| age >= staleness).unwrap_or(false),
        None => false,
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut it| it.next().is_none())
        .unwrap_or(false)
}

fn remove_empty(path: &Path) -> bool {
    match fs::remove_dir(path) {
        Ok(()) => {
            debug!(dir = %path.display(), "Removed empty directory");
            true
        }
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::DirectoryNotEmpty
            ) =>
        {
            // Raced with a writer or another cleanup.
            debug!(dir = %path.display(), error = %e, "Directory changed before removal");
            false
        }
        Err(e) => {
            warn!(dir = %path.display(), error = %e, "Failed to remove empty directory");
            false
        }
    }
}

/// Background thread running `reap_empty_dirs` over a fixed set of roots.
pub struct DirectoryReaper {
    stop: StopSignal,
    handle: Option<JoinHandle<()>>,
}

impl DirectoryReaper {
    /// First sweep happens one `interval` after start.
    pub fn start(roots: Vec<PathBuf>, interval: Duration, staleness: Duration) -> io::Result<Self> {
        let stop = StopSignal::new();
        let signal = stop.clone();
        let handle = thread::Builder::new()
            .name("reaper".into())
            .spawn(move || {
                while !signal.wait_timeout(interval) {
                    sweep_all(&roots, staleness);
                }
            })?;
        debug!(interval_secs = interval.as_secs(), staleness_secs = staleness.as_secs(), "Reaper started");
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.stop.stop();
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                warn!("Reaper thread panicked");
            }
        }
    }
}

impl Drop for DirectoryReaper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One pass over every root.
pub fn sweep_all(roots: &[PathBuf], staleness: Duration) -> ReapReport {
    let mut total = ReapReport::default();
    for root in roots {
        total += reap_empty_dirs(root, staleness);
    }
    if total.removed > 0 {
        info!(visited = total.visited, removed = total.removed, "Removed empty directories");
    }
    total
}
