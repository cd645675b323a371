//! Shared FIFO between the watcher (producer) and the worker pool (consumers).

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::task::StagingTask;

/// Unbounded, thread-safe task queue. Cloning yields another handle to the
/// same queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    inner: Arc<Mutex<VecDeque<StagingTask>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the back. Never blocks beyond the short critical section.
    pub fn enqueue(&self, task: StagingTask) {
        self.inner.lock().push_back(task);
    }

    /// Pop the front task, if any.
    pub fn try_dequeue(&self) -> Option<StagingTask> {
        self.inner.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    fn task(i: usize) -> StagingTask {
        StagingTask::new(format!("/src/{i}"), format!("/dst/{i}")).unwrap()
    }

    #[test]
    fn fifo_single_producer() {
        let q = TaskQueue::new();
        assert!(q.try_dequeue().is_none());
        q.enqueue(task(1));
        q.enqueue(task(2));
        assert_eq!(q.len(), 2);
        assert_eq!(q.try_dequeue(), Some(task(1)));
        assert_eq!(q.try_dequeue(), Some(task(2)));
        assert!(q.is_empty());
    }

    #[test]
    fn concurrent_producers_and_consumers_lose_nothing() {
        let q = TaskQueue::new();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        q.enqueue(task(p * 1000 + i));
                    }
                })
            })
            .collect();
        for h in producers {
            h.join().unwrap();
        }

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let q = q.clone();
                thread::spawn(move || {
                    let mut got = Vec::new();
                    while let Some(t) = q.try_dequeue() {
                        got.push(t);
                    }
                    got
                })
            })
            .collect();
        let mut seen = HashSet::new();
        for h in consumers {
            for t in h.join().unwrap() {
                assert!(seen.insert(t), "task handed out twice");
            }
        }
        assert_eq!(seen.len(), 1000);
        assert!(q.is_empty());
    }
}
