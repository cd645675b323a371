//! Move worker pool.
//!
//! Fixed number of named OS threads draining the shared queue. Each task gets
//! up to `retry_count` attempts per cycle with `retry_wait` between them; an
//! exhausted task goes to the back of the queue and the worker moves on.
//! Tasks are never dropped, so a permanently failing file cycles forever.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::mover::{MoveOutcome, Relocate};
use super::queue::TaskQueue;
use super::task::StagingTask;
use crate::config::Config;
use crate::errors::MoveError;
use crate::fs_ops::io_hint;
use crate::shutdown::StopSignal;

/// Pause between polls of an empty queue.
pub const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub workers: usize,
    pub retry_count: u32,
    pub retry_wait: Duration,
    pub idle_poll: Duration,
}

impl PoolSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            workers: cfg.worker_count(),
            retry_count: cfg.move_retry_count.max(1),
            retry_wait: cfg.move_retry_wait,
            idle_poll: IDLE_POLL,
        }
    }
}

/// Point-in-time copy of the pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub completed: u64,
    pub already_moved: u64,
    pub failed_attempts: u64,
    pub requeued: u64,
    pub in_flight: usize,
}

#[derive(Default)]
pub(crate) struct Counters {
    completed: AtomicU64,
    already_moved: AtomicU64,
    failed_attempts: AtomicU64,
    requeued: AtomicU64,
    in_flight: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> PoolStats {
        PoolStats {
            completed: self.completed.load(Ordering::Relaxed),
            already_moved: self.already_moved.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::SeqCst),
        }
    }
}

/// What happened to a dequeued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Done(MoveOutcome),
    Requeued { attempts: u32 },
}

/// Everything a worker thread shares with its siblings.
pub(crate) struct WorkerContext {
    pub(crate) queue: TaskQueue,
    pub(crate) relocator: Arc<dyn Relocate>,
    pub(crate) settings: PoolSettings,
    pub(crate) stop: StopSignal,
    pub(crate) counters: Arc<Counters>,
}

pub struct MoveWorkerPool {
    ctx: Arc<WorkerContext>,
    handles: Vec<JoinHandle<()>>,
}

impl MoveWorkerPool {
    /// Spawn `settings.workers` threads (at least one) draining `queue`.
    pub fn start(
        queue: TaskQueue,
        relocator: Arc<dyn Relocate>,
        settings: PoolSettings,
    ) -> io::Result<Self> {
        let workers = settings.workers.max(1);
        let ctx = Arc::new(WorkerContext {
            queue,
            relocator,
            settings,
            stop: StopSignal::new(),
            counters: Arc::new(Counters::default()),
        });

        let mut pool = Self {
            ctx,
            handles: Vec::with_capacity(workers),
        };
        for id in 0..workers {
            let ctx = Arc::clone(&pool.ctx);
            let handle = thread::Builder::new()
                .name(format!("mover-{id}"))
                .spawn(move || worker_loop(&ctx, id));
            match handle {
                Ok(h) => pool.handles.push(h),
                Err(e) => {
                    pool.stop();
                    return Err(e);
                }
            }
        }
        info!(workers, retry_count = pool.ctx.settings.retry_count, "Move workers started");
        Ok(pool)
    }

    pub fn stats(&self) -> PoolStats {
        self.ctx.counters.snapshot()
    }

    /// True when nothing is queued and no worker holds a task.
    /// Callers wanting a stable answer should observe it twice in a row.
    pub fn is_idle(&self) -> bool {
        self.ctx.queue.is_empty() && self.ctx.counters.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Wake every worker and join them. In-flight copies finish first;
    /// tasks waiting for a retry are put back on the queue.
    pub fn stop(&mut self) {
        self.ctx.stop.stop();
        for h in self.handles.drain(..) {
            if h.join().is_err() {
                warn!("Move worker panicked");
            }
        }
    }
}

impl Drop for MoveWorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(ctx: &WorkerContext, id: usize) {
    debug!(worker = id, "Worker started");
    while !ctx.stop.is_stopped() {
        // Count ourselves busy before touching the queue so idle checks
        // never see an empty queue with an untracked task.
        ctx.counters.in_flight.fetch_add(1, Ordering::SeqCst);
        match ctx.queue.try_dequeue() {
            Some(task) => {
                process_task(ctx, task);
                ctx.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            None => {
                ctx.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
                if ctx.stop.wait_timeout(ctx.settings.idle_poll) {
                    break;
                }
            }
        }
    }
    debug!(worker = id, "Worker stopped");
}

/// Run one attempt cycle for `task`.
pub(crate) fn process_task(ctx: &WorkerContext, task: StagingTask) -> Disposition {
    let mut attempts: u32 = 0;
    loop {
        match ctx.relocator.relocate(&task) {
            Ok(outcome) => {
                record_outcome(&ctx.counters, &task, outcome);
                return Disposition::Done(outcome);
            }
            Err(e) => {
                ctx.counters.failed_attempts.fetch_add(1, Ordering::Relaxed);
                log_failure(&task, &e, attempts + 1, ctx.settings.retry_count);

                let stopped = ctx.stop.wait_timeout(ctx.settings.retry_wait);
                attempts += 1;
                if attempts >= ctx.settings.retry_count || stopped {
                    warn!(
                        src = %task.source_path().display(),
                        attempts,
                        "Retries exhausted; re-queueing"
                    );
                    ctx.queue.enqueue(task);
                    ctx.counters.requeued.fetch_add(1, Ordering::Relaxed);
                    return Disposition::Requeued { attempts };
                }
            }
        }
    }
}

fn record_outcome(counters: &Counters, task: &StagingTask, outcome: MoveOutcome) {
    match outcome {
        MoveOutcome::Moved { .. } => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        }
        MoveOutcome::AlreadyMoved => {
            counters.already_moved.fetch_add(1, Ordering::Relaxed);
            debug!(src = %task.source_path().display(), "Source already gone; nothing to move");
        }
        MoveOutcome::InPlace => {
            debug!(src = %task.source_path().display(), "Source equals destination; skipped");
        }
        MoveOutcome::NotAFile => {
            info!(src = %task.source_path().display(), "Source is not a regular file; skipped");
        }
    }
}

fn log_failure(task: &StagingTask, e: &MoveError, attempt: u32, of: u32) {
    let hint = match e {
        MoveError::Io { source, .. } => io_hint(source).unwrap_or(""),
        _ => "",
    };
    warn!(
        src = %task.source_path().display(),
        dest = %task.destination_path().display(),
        attempt,
        of,
        kind = e.kind(),
        hint,
        error = %e,
        "Move attempt failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Instant;
    use tempfile::tempdir;

    use crate::staging::mover::VerifiedMover;

    /// Fails every call and records how often it was asked.
    #[derive(Default)]
    struct AlwaysFails {
        calls: AtomicU64,
    }

    impl Relocate for AlwaysFails {
        fn relocate(&self, task: &StagingTask) -> Result<MoveOutcome, MoveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(MoveError::Io {
                op: "copy",
                path: task.source_path().to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "locked"),
            })
        }
    }

    /// Fails `n` times, then succeeds.
    struct FailsThenMoves {
        remaining: AtomicU64,
    }

    impl Relocate for FailsThenMoves {
        fn relocate(&self, _task: &StagingTask) -> Result<MoveOutcome, MoveError> {
            if self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(MoveError::Integrity {
                    source_path: PathBuf::from("/a"),
                    source_digest: "00".into(),
                    destination_path: PathBuf::from("/b"),
                    destination_digest: "ff".into(),
                });
            }
            Ok(MoveOutcome::Moved { bytes: 1 })
        }
    }

    /// Records which sources are being worked on and flags overlap.
    #[derive(Default)]
    struct Exclusive {
        active: Mutex<HashSet<PathBuf>>,
        overlap: AtomicU64,
        inner: VerifiedMover,
    }

    impl Relocate for Exclusive {
        fn relocate(&self, task: &StagingTask) -> Result<MoveOutcome, MoveError> {
            if !self.active.lock().insert(task.source_path().to_path_buf()) {
                self.overlap.fetch_add(1, Ordering::SeqCst);
            }
            let r = self.inner.relocate(task);
            self.active.lock().remove(task.source_path());
            r
        }
    }

    fn settings(workers: usize, retry_count: u32) -> PoolSettings {
        PoolSettings {
            workers,
            retry_count,
            retry_wait: Duration::from_millis(1),
            idle_poll: Duration::from_millis(5),
        }
    }

    fn ctx(relocator: Arc<dyn Relocate>, retry_count: u32) -> WorkerContext {
        WorkerContext {
            queue: TaskQueue::new(),
            relocator,
            settings: settings(1, retry_count),
            stop: StopSignal::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    fn task() -> StagingTask {
        StagingTask::new("/src/a.txt", "/dst/a.txt").unwrap()
    }

    #[test]
    fn exhausted_task_is_requeued_after_exact_attempts() {
        let mover = Arc::new(AlwaysFails::default());
        let ctx = ctx(mover.clone(), 3);

        let d = process_task(&ctx, task());
        assert_eq!(d, Disposition::Requeued { attempts: 3 });
        assert_eq!(mover.calls.load(Ordering::SeqCst), 3);
        assert_eq!(ctx.queue.len(), 1);
        assert_eq!(ctx.queue.try_dequeue(), Some(task()));

        let stats = ctx.counters.snapshot();
        assert_eq!(stats.failed_attempts, 3);
        assert_eq!(stats.requeued, 1);
        assert_eq!(stats.completed, 0);
    }

    #[test]
    fn success_within_budget_is_not_requeued() {
        let mover = Arc::new(FailsThenMoves {
            remaining: AtomicU64::new(2),
        });
        let ctx = ctx(mover, 3);
        assert_eq!(
            process_task(&ctx, task()),
            Disposition::Done(MoveOutcome::Moved { bytes: 1 })
        );
        assert!(ctx.queue.is_empty());
        assert_eq!(ctx.counters.snapshot().failed_attempts, 2);
        assert_eq!(ctx.counters.snapshot().completed, 1);
    }

    #[test]
    fn stop_during_retry_wait_requeues_early() {
        let mover = Arc::new(AlwaysFails::default());
        let mut ctx = ctx(mover.clone(), 5);
        ctx.settings.retry_wait = Duration::from_secs(30);
        ctx.stop.stop();

        let started = Instant::now();
        assert_eq!(process_task(&ctx, task()), Disposition::Requeued { attempts: 1 });
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(ctx.queue.len(), 1);
    }

    #[test]
    fn huge_retry_wait_still_requeues_on_stop() {
        let mover = Arc::new(AlwaysFails::default());
        let mut ctx = ctx(mover, 5);
        ctx.settings.retry_wait = Duration::from_secs(u64::MAX);
        let stop = ctx.stop.clone();
        let queue = ctx.queue.clone();

        let worker = thread::spawn(move || process_task(&ctx, task()));
        thread::sleep(Duration::from_millis(50));
        stop.stop();
        assert_eq!(worker.join().unwrap(), Disposition::Requeued { attempts: 1 });
        assert_eq!(queue.try_dequeue(), Some(task()));
    }

    #[test]
    fn pool_drains_every_task_exactly_once() {
        let td = tempdir().unwrap();
        let src_dir = td.path().join("src");
        let dst_dir = td.path().join("dst");
        fs::create_dir_all(&src_dir).unwrap();

        let queue = TaskQueue::new();
        const N: usize = 60;
        for i in 0..N {
            let src = src_dir.join(format!("f{i}.dat"));
            fs::write(&src, format!("contents {i}")).unwrap();
            queue.enqueue(StagingTask::new(&src, dst_dir.join(format!("f{i}.dat"))).unwrap());
        }

        let mover = Arc::new(Exclusive::default());
        let mut pool = MoveWorkerPool::start(queue.clone(), mover.clone(), settings(4, 2)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(30);
        while pool.stats().completed < N as u64 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        pool.stop();

        assert_eq!(pool.stats().completed, N as u64);
        assert_eq!(mover.overlap.load(Ordering::SeqCst), 0);
        assert!(queue.is_empty());
        assert_eq!(fs::read_dir(&src_dir).unwrap().count(), 0);
        for i in 0..N {
            let got = fs::read_to_string(dst_dir.join(format!("f{i}.dat"))).unwrap();
            assert_eq!(got, format!("contents {i}"));
        }
    }

    #[test]
    fn stop_joins_idle_workers_promptly() {
        let mut pool = MoveWorkerPool::start(
            TaskQueue::new(),
            Arc::new(VerifiedMover),
            PoolSettings {
                idle_poll: Duration::from_secs(60),
                ..settings(3, 1)
            },
        )
        .unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(pool.is_idle());
        let started = Instant::now();
        pool.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
