//! Service lifecycle.
//!
//! Start order: clean up orphan temp copies, start the workers, subscribe the
//! watcher, queue files already present, start the reaper.
//! Stop order: workers (joined), watcher, reaper. Tasks still queued at stop
//! are logged and discarded; the startup sweep picks their files up again.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::mover::{Relocate, VerifiedMover};
use super::pool::{MoveWorkerPool, PoolSettings, PoolStats};
use super::queue::TaskQueue;
use super::reaper::{self, DirectoryReaper, ReapReport};
use super::reconcile::reconcile;
use super::watcher::{DirectoryWatcher, EventRouter};
use crate::config::Config;

pub struct StagingService {
    config: Arc<Config>,
    queue: TaskQueue,
    router: EventRouter,
    pool: Option<MoveWorkerPool>,
    watcher: Option<DirectoryWatcher>,
    reaper: Option<DirectoryReaper>,
    final_stats: PoolStats,
}

impl StagingService {
    /// Start with the SHA-256 verified mover. `config` should already have
    /// been through `validate_and_normalize`.
    pub fn start(config: Config) -> Result<Self> {
        Self::start_with(config, Arc::new(VerifiedMover))
    }

    /// Start with a caller-supplied relocator.
    pub fn start_with(config: Config, relocator: Arc<dyn Relocate>) -> Result<Self> {
        let config = Arc::new(config);
        let queue = TaskQueue::new();
        let router = EventRouter::new(&config.locations, queue.clone());

        reconcile(&config.locations);

        let pool = MoveWorkerPool::start(queue.clone(), relocator, PoolSettings::from_config(&config))
            .context("start move workers")?;

        let mut service = Self {
            config: Arc::clone(&config),
            queue,
            router: router.clone(),
            pool: Some(pool),
            watcher: None,
            reaper: None,
            final_stats: PoolStats::default(),
        };

        service.watcher = Some(DirectoryWatcher::start(router).context("watch source directories")?);

        if config.scan_existing {
            service.router.sweep();
        }

        service.reaper = Some(
            DirectoryReaper::start(service.reap_roots(), config.reap_interval, config.reap_staleness)
                .context("start directory reaper")?,
        );

        info!(locations = config.locations.len(), "Staging service started");
        Ok(service)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.as_ref().map_or(self.final_stats, |p| p.stats())
    }

    /// Queue every file currently present in the source trees.
    pub fn sweep(&self) -> usize {
        self.router.sweep()
    }

    /// Run one reaper pass now, outside the timer.
    pub fn reap_now(&self) -> ReapReport {
        reaper::sweep_all(&self.reap_roots(), self.config.reap_staleness)
    }

    /// Block until the queue is empty and no worker holds a task, or until
    /// `timeout`. Returns true when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let Some(pool) = self.pool.as_ref() else {
            return self.queue.is_empty();
        };
        let deadline = Instant::now().checked_add(timeout);
        let mut idle_streak = 0;
        while deadline.is_none_or(|d| Instant::now() < d) {
            if pool.is_idle() {
                idle_streak += 1;
                // Two observations apart, to cover a task being handed back.
                if idle_streak >= 2 {
                    return true;
                }
            } else {
                idle_streak = 0;
            }
            thread::sleep(Duration::from_millis(25));
        }
        false
    }

    /// Stop workers, watcher and reaper, in that order. Idempotent.
    pub fn stop(&mut self) {
        let Some(mut pool) = self.pool.take() else {
            return;
        };
        pool.stop();
        let stats = pool.stats();
        self.final_stats = stats;

        if let Some(mut w) = self.watcher.take() {
            w.stop();
        }
        if let Some(mut r) = self.reaper.take() {
            r.stop();
        }

        let pending = self.queue.len();
        if pending > 0 {
            warn!(pending, "Stopped with tasks still queued; they will be picked up on next start");
        }
        info!(
            completed = stats.completed,
            already_moved = stats.already_moved,
            failed_attempts = stats.failed_attempts,
            requeued = stats.requeued,
            "Staging service stopped"
        );
    }

    fn reap_roots(&self) -> Vec<PathBuf> {
        let roots: BTreeSet<PathBuf> = self
            .config
            .locations
            .iter()
            .map(|l| l.source().to_path_buf())
            .collect();
        roots.into_iter().collect()
    }
}

impl Drop for StagingService {
    fn drop(&mut self) {
        self.stop();
    }
}
