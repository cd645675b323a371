//! Platform-specific helpers.
//! This module hides OS differences (Unix/Windows) behind a uniform API so
//! the rest of the codebase can remain platform-agnostic.

#[cfg(unix)]
mod common_unix;
mod temp;
#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;

#[cfg(unix)]
pub use unix::{
    available_space, open_log_file_secure, set_dir_mode_0700, set_file_mode_0600,
    write_settings_atomic_0600,
};

#[cfg(not(unix))]
pub use windows::{
    available_space, open_log_file_secure, set_dir_mode_0700, set_file_mode_0600,
    write_settings_atomic_0600,
};
