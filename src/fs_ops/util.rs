use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const TEMP_PREFIX: &str = ".backup_staging.";
const TEMP_SUFFIX: &str = ".tmp";

static SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden temp name inside `dst_dir`: ".backup_staging.<pid>.<nanos>.<seq>.tmp".
/// The sequence number keeps concurrent workers in one process apart.
pub(super) fn unique_temp_path(dst_dir: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    dst_dir.join(format!("{TEMP_PREFIX}{pid}.{nanos}.{seq}{TEMP_SUFFIX}"))
}

/// True for temp copies produced by `unique_temp_path`.
pub fn is_staging_temp(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX))
        .unwrap_or(false)
}

#[cfg(unix)]
pub(super) fn fsync_dir(dir: &Path) -> io::Result<()> {
    let f = File::open(dir)?;
    f.sync_all()
}

#[cfg(windows)]
pub(super) fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_names_are_recognized_and_unique() {
        let dir = Path::new("/dst");
        let a = unique_temp_path(dir);
        let b = unique_temp_path(dir);
        assert_ne!(a, b);
        assert!(is_staging_temp(&a));
        assert!(!is_staging_temp(Path::new("/dst/report.txt")));
        assert!(!is_staging_temp(Path::new("/dst/.backup_staging.settings.tmp.1.2.3")));
    }
}
