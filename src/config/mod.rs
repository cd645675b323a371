//! Config module.
//! Provides configuration types, default paths, XML loading/saving, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

use std::time::Duration;

pub use paths::{default_config_path, default_log_path, default_staging_dir, path_has_symlink_ancestor};
pub use types::{Config, Location, LogLevel, Replacement};
pub use validate::validate_and_normalize;
pub use xml::{load_config_from_xml_path, load_or_init, save_config_to_xml_path, LoadResult};

/// Attempts per cycle when the settings file does not say otherwise.
pub const DEFAULT_MOVE_RETRY_COUNT: u32 = 5;
/// Pause after a failed attempt when the settings file does not say otherwise.
pub const DEFAULT_MOVE_RETRY_WAIT: Duration = Duration::from_secs(30);
/// One worker unless configured.
pub const DEFAULT_THREADS: i32 = 1;
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_REAP_STALENESS: Duration = Duration::from_secs(10 * 60);

/// Env var that overrides the settings file location.
pub const CONFIG_ENV: &str = "BACKUP_STAGING_CONFIG";
