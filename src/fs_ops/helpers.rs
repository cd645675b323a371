//! I/O error hints.
//!
//! Maps an io::Error onto a short, actionable hint that workers attach to
//! their retry log lines as a structured field:
//!
//!   warn!(hint = io_hint(&e).unwrap_or(""), error = %e, "Move attempt failed");

use std::io;

/// Platform-aware hint by raw OS code, falling back to the error kind.
pub fn io_hint(e: &io::Error) -> Option<&'static str> {
    if let Some(code) = e.raw_os_error() {
        if let Some(h) = os_code_hint(code) {
            return Some(h);
        }
    }
    match e.kind() {
        io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and write permissions"),
        io::ErrorKind::NotFound => Some("path not found; it may have been moved already"),
        io::ErrorKind::AlreadyExists => Some("already exists"),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            Some("busy/timed out; retry after the current write finishes")
        }
        _ => None,
    }
}

#[cfg(unix)]
fn os_code_hint(code: i32) -> Option<&'static str> {
    let h = match code {
        libc::EACCES | libc::EPERM => "permission denied; check ownership and write permissions",
        libc::EBUSY => "resource busy; ensure no other process is writing",
        libc::ENOENT => "path not found; it may have been moved already",
        libc::ENOSPC => "insufficient space on device",
        libc::EROFS => "read-only filesystem; cannot write here",
        libc::ELOOP => "too many symbolic link levels; possible symlink cycle",
        libc::ENAMETOOLONG => "filename or path too long; check replacements",
        libc::EMFILE => "process file descriptor limit reached; lower the thread count or raise limits",
        libc::ENFILE => "system-wide file table overflow; reduce open files",
        _ => return None,
    };
    Some(h)
}

#[cfg(windows)]
fn os_code_hint(code: i32) -> Option<&'static str> {
    let h = match code {
        5 => "access denied; check permissions",                      // ERROR_ACCESS_DENIED
        32 => "sharing violation; file is in use",                    // ERROR_SHARING_VIOLATION
        33 => "lock violation; part of the file is locked",           // ERROR_LOCK_VIOLATION
        2 | 3 => "path not found; it may have been moved already",    // FILE/PATH NOT FOUND
        112 => "insufficient disk space",                             // ERROR_DISK_FULL
        19 => "write protected / read-only media",                    // ERROR_WRITE_PROTECT
        206 => "filename or path too long; check replacements",       // ERROR_FILENAME_EXCED_RANGE
        4 => "too many open files; lower the thread count",           // ERROR_TOO_MANY_OPEN_FILES
        _ => return None,
    };
    Some(h)
}
