//! The staging pipeline: watch source trees, queue files, move them with
//! digest verification, and reap empty directories left behind.

pub mod digest;
pub mod mover;
pub mod pool;
pub mod queue;
pub mod reaper;
pub mod reconcile;
pub mod rewrite;
pub mod service;
pub mod task;
pub mod watcher;

pub use mover::{MoveOutcome, Relocate, VerifiedMover};
pub use pool::{MoveWorkerPool, PoolSettings, PoolStats};
pub use queue::TaskQueue;
pub use reaper::{DirectoryReaper, ReapReport, reap_empty_dirs};
pub use rewrite::rewrite;
pub use service::StagingService;
pub use task::StagingTask;
pub use watcher::{DirectoryWatcher, EventRouter};
