//! Core library for `backup_staging`.
//!
//! Files dropped into watched source trees are queued, copied into their
//! destination trees with path rewriting, verified by SHA-256 and only then
//! removed from the source. Empty source subdirectories are reaped in the
//! background.
//!
//! Layout:
//! - `config`: settings types, XML load/save, validation
//! - `staging`: watcher, queue, workers, reaper and the service tying them together
//! - `fs_ops`: temp-file copy and rename primitives
//! - `platform`: OS-specific file permissions and free-space queries

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs_ops;
pub mod output;
pub mod platform;
pub mod shutdown;
pub mod staging;

pub use config::types::{Config, Location, LogLevel, Replacement};
pub use config::{default_config_path, default_log_path, path_has_symlink_ancestor};
pub use errors::{MoveError, StagingError};
pub use staging::{
    MoveOutcome, PoolStats, Relocate, StagingService, StagingTask, TaskQueue, VerifiedMover,
};
