//! Timestamp preservation.
//! The destination keeps the source's modification time, like a plain copy on Windows does.

use filetime::{set_file_mtime, FileTime};
use std::fs::Metadata;
use std::io;
use std::path::Path;

pub(super) fn preserve_mtime(src_meta: &Metadata, dest: &Path) -> io::Result<()> {
    let mtime = FileTime::from_last_modification_time(src_meta);
    set_file_mtime(dest, mtime)
}
