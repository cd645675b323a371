//! Source tree watching.
//!
//! `EventRouter` turns filesystem paths into queued tasks: it picks the
//! location that owns a path, rewrites it, and enqueues the result.
//! `DirectoryWatcher` feeds it from a recursive `notify` watch on every
//! source root. The notify callback thread is the only producer besides the
//! startup sweep.

#[cfg(target_os = "linux")]
use notify::event::CreateKind;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use walkdir::WalkDir;

use super::queue::TaskQueue;
use super::rewrite::rewrite;
use super::task::StagingTask;
use crate::config::Location;
use crate::fs_ops::is_staging_temp;

/// Maps paths under watched roots onto tasks in the shared queue.
#[derive(Clone)]
pub struct EventRouter {
    locations: Arc<[Location]>,
    queue: TaskQueue,
}

impl EventRouter {
    /// Identity locations are dropped here; nothing under them is ever queued.
    pub fn new(locations: &[Location], queue: TaskQueue) -> Self {
        let active: Vec<Location> = locations
            .iter()
            .filter(|l| {
                if l.is_identity() {
                    info!(source = %l.source().display(), "Identity location; not watched");
                }
                !l.is_identity()
            })
            .cloned()
            .collect();
        Self {
            locations: active.into(),
            queue,
        }
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Build the task for `path`, or None when no location owns it or the
    /// rewrite would leave it where it is.
    pub fn route_path(&self, path: &Path) -> Option<StagingTask> {
        let location = self
            .locations
            .iter()
            .filter(|l| path.starts_with(l.source()))
            .max_by_key(|l| l.source().components().count())?;

        let destination = match rewrite(location, path) {
            Ok(d) => d,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot rewrite path; skipped");
                return None;
            }
        };
        if destination == path {
            trace!(path = %path.display(), "Rewrite is identity; skipped");
            return None;
        }
        match StagingTask::new(path, destination) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot build task; skipped");
                None
            }
        }
    }

    /// Enqueue work for one notify event. Returns the number of tasks queued.
    pub fn handle_event(&self, event: &Event) -> usize {
        match event.kind {
            // inotify reports file creation at open(2), before any bytes land.
            // The close-after-write event that follows queues the file instead.
            #[cfg(target_os = "linux")]
            EventKind::Create(CreateKind::File) => 0,
            EventKind::Create(_)
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
            | EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
                event.paths.iter().map(|p| self.offer(p)).sum()
            }
            // Both paths are reported; only the new name matters.
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                event.paths.last().map_or(0, |p| self.offer(p))
            }
            _ => 0,
        }
    }

    /// Queue every regular file currently under `dir`.
    pub fn enqueue_tree(&self, dir: &Path) -> usize {
        let mut queued = 0;
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() {
                queued += self.enqueue_file(entry.path());
            }
        }
        queued
    }

    /// Queue every file already present under all watched roots.
    pub fn sweep(&self) -> usize {
        let queued: usize = self
            .locations
            .iter()
            .map(|l| self.enqueue_tree(l.source()))
            .sum();
        if queued > 0 {
            info!(queued, "Queued files already present in source trees");
        }
        queued
    }

    fn offer(&self, path: &Path) -> usize {
        // Type check only; the file may already be gone.
        match fs::symlink_metadata(path) {
            Ok(m) if m.is_file() => self.enqueue_file(path),
            // Files can land in a new directory before the recursive watch
            // covers it.
            Ok(m) if m.is_dir() => self.enqueue_tree(path),
            _ => 0,
        }
    }

    fn enqueue_file(&self, path: &Path) -> usize {
        if is_staging_temp(path) {
            return 0;
        }
        match self.route_path(path) {
            Some(task) => {
                debug!(
                    src = %task.source_path().display(),
                    dest = %task.destination_path().display(),
                    "Queued"
                );
                self.queue.enqueue(task);
                1
            }
            None => 0,
        }
    }
}

/// Recursive watch over every non-identity source root.
pub struct DirectoryWatcher {
    router: EventRouter,
    watcher: Option<RecommendedWatcher>,
}

impl DirectoryWatcher {
    /// Subscribe to every root of `router`. With no roots this is a logged no-op.
    pub fn start(router: EventRouter) -> notify::Result<Self> {
        if router.locations().is_empty() {
            info!("No source directories to watch");
            return Ok(Self {
                router,
                watcher: None,
            });
        }

        let handler = router.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                handler.handle_event(&event);
            }
            Err(e) => error!(error = %e, "Watch error"),
        })?;

        for location in router.locations() {
            watcher.watch(location.source(), RecursiveMode::Recursive)?;
            info!(
                source = %location.source().display(),
                destination = %location.destination().display(),
                "Watching"
            );
        }

        Ok(Self {
            router,
            watcher: Some(watcher),
        })
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Drop the subscription. Events already delivered may still enqueue.
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            debug!("Directory watcher stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Replacement;
    use notify::event::CreateKind;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn loc(src: &Path, dst: &Path) -> Location {
        Location::new(src, dst).unwrap()
    }

    #[test]
    fn longest_matching_root_wins() {
        let base = std::env::temp_dir();
        let outer = loc(&base.join("stage"), &base.join("out"));
        let inner = loc(&base.join("stage").join("special"), &base.join("special_out"));
        let router = EventRouter::new(&[outer, inner], TaskQueue::new());

        let t = router
            .route_path(&base.join("stage").join("special").join("a.txt"))
            .unwrap();
        assert_eq!(t.destination_path(), base.join("special_out").join("a.txt"));

        let t = router.route_path(&base.join("stage").join("b.txt")).unwrap();
        assert_eq!(t.destination_path(), base.join("out").join("b.txt"));

        assert!(router.route_path(&base.join("unrelated").join("c.txt")).is_none());
    }

    #[test]
    fn identity_locations_are_ignored() {
        let base = std::env::temp_dir().join("same");
        let router = EventRouter::new(&[loc(&base, &base)], TaskQueue::new());
        assert!(router.locations().is_empty());
        assert!(router.route_path(&base.join("a.txt")).is_none());
    }

    #[test]
    fn replacement_that_changes_nothing_is_skipped() {
        let base = std::env::temp_dir().join("same2");
        let l = loc(&base, &base).with_replacements([Replacement::new("incoming", "final").unwrap()]);
        let router = EventRouter::new(&[l], TaskQueue::new());
        assert!(router.route_path(&base.join("a.txt")).is_none());
        let t = router.route_path(&base.join("incoming").join("a.txt")).unwrap();
        assert_eq!(t.destination_path(), base.join("final").join("a.txt"));
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn create_event_for_file_is_queued() {
        let td = tempdir().unwrap();
        let src = td.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let file = src.join("new.txt");
        fs::write(&file, b"x").unwrap();

        let queue = TaskQueue::new();
        let router = EventRouter::new(&[loc(&src, &td.path().join("dst"))], queue.clone());
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone());
        assert_eq!(router.handle_event(&event), 1);
        assert_eq!(queue.try_dequeue().unwrap().source_path(), file.as_path());
    }

    #[test]
    fn close_after_write_is_queued() {
        let td = tempdir().unwrap();
        let src = td.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let file = src.join("written.txt");
        fs::write(&file, b"done writing").unwrap();

        let queue = TaskQueue::new();
        let router = EventRouter::new(&[loc(&src, &td.path().join("dst"))], queue.clone());
        let event =
            Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write))).add_path(file.clone());
        assert_eq!(router.handle_event(&event), 1);
        assert_eq!(queue.try_dequeue().unwrap().source_path(), file.as_path());

        // Closing a file opened read-only is not a reason to move it.
        let read = Event::new(EventKind::Access(AccessKind::Close(AccessMode::Read))).add_path(file);
        assert_eq!(router.handle_event(&read), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn file_create_waits_for_writer_to_close() {
        let td = tempdir().unwrap();
        let src = td.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let file = src.join("half.bin");
        fs::write(&file, b"").unwrap();

        let queue = TaskQueue::new();
        let router = EventRouter::new(&[loc(&src, &td.path().join("dst"))], queue.clone());
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(file);
        assert_eq!(router.handle_event(&event), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn vanished_file_and_other_events_are_dropped() {
        let td = tempdir().unwrap();
        let src = td.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let file = src.join("f.txt");
        fs::write(&file, b"x").unwrap();

        let queue = TaskQueue::new();
        let router = EventRouter::new(&[loc(&src, &td.path().join("dst"))], queue.clone());

        let gone = Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write)))
            .add_path(src.join("gone.txt"));
        assert_eq!(router.handle_event(&gone), 0);

        let removed = Event::new(EventKind::Remove(notify::event::RemoveKind::File)).add_path(file);
        assert_eq!(router.handle_event(&removed), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn rename_into_tree_uses_new_name() {
        let td = tempdir().unwrap();
        let src = td.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let to = src.join("renamed.txt");
        fs::write(&to, b"x").unwrap();

        let queue = TaskQueue::new();
        let router = EventRouter::new(&[loc(&src, &td.path().join("dst"))], queue.clone());
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(src.join("old.txt"))
            .add_path(to.clone());
        assert_eq!(router.handle_event(&event), 1);
        assert_eq!(queue.try_dequeue().unwrap().source_path(), to.as_path());
    }

    #[test]
    fn new_directory_enqueues_its_files() {
        let td = tempdir().unwrap();
        let src = td.path().join("src");
        let dir = src.join("batch").join("nested");
        fs::create_dir_all(&dir).unwrap();
        fs::write(src.join("batch").join("a.txt"), b"a").unwrap();
        fs::write(dir.join("b.txt"), b"b").unwrap();

        let queue = TaskQueue::new();
        let router = EventRouter::new(&[loc(&src, &td.path().join("dst"))], queue.clone());
        let event =
            Event::new(EventKind::Create(CreateKind::Folder)).add_path(src.join("batch"));
        assert_eq!(router.handle_event(&event), 2);

        let mut dests: Vec<PathBuf> = std::iter::from_fn(|| queue.try_dequeue())
            .map(|t| t.destination_path().to_path_buf())
            .collect();
        dests.sort();
        assert_eq!(
            dests,
            vec![
                td.path().join("dst").join("batch").join("a.txt"),
                td.path().join("dst").join("batch").join("nested").join("b.txt"),
            ]
        );
    }

    #[test]
    fn sweep_covers_all_roots() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::create_dir_all(a.join("x")).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("x").join("1"), b"1").unwrap();
        fs::write(b.join("2"), b"2").unwrap();

        let queue = TaskQueue::new();
        let router = EventRouter::new(
            &[loc(&a, &td.path().join("a_out")), loc(&b, &td.path().join("b_out"))],
            queue.clone(),
        );
        assert_eq!(router.sweep(), 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn watcher_without_locations_is_a_no_op() {
        let mut w = DirectoryWatcher::start(EventRouter::new(&[], TaskQueue::new())).unwrap();
        assert!(w.router().locations().is_empty());
        w.stop();
    }
}
