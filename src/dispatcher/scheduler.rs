//! Deferred task scheduling for timed note-offs
//!
//! The dispatcher never sleeps itself. It hands each note-off to a
//! [`Scheduler`], which runs it once after the requested delay.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::trace;

/// Fire-once deferred work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs a task once after a delay, without blocking the caller
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task);
}

/// Real-time scheduler backed by tokio timers
#[derive(Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler on the runtime of the calling context, if any
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

/// Pending task on the manual clock
struct Pending {
    due: Duration,
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
}

/// Deterministic scheduler whose clock only moves when told to.
///
/// Tasks run on the thread calling [`ManualScheduler::advance`], in due
/// order; tasks due at the same instant run in scheduling order.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<ManualClock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on the manual clock
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Number of tasks not yet run
    pub fn pending(&self) -> usize {
        self.clock.lock().pending.len()
    }

    /// Move the clock forward and run every task that became due.
    ///
    /// Returns the number of tasks run. Tasks scheduled by a running task
    /// also run if they fall inside the window.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.clock.lock().now + by;
        let mut ran = 0;

        loop {
            // Take the next due task without holding the lock while it runs
            let next = {
                let mut clock = self.clock.lock();
                let idx = clock
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(i, _)| i);

                match idx {
                    Some(i) => {
                        let pending = clock.pending.swap_remove(i);
                        clock.now = clock.now.max(pending.due);
                        Some(pending)
                    }
                    None => {
                        clock.now = target;
                        None
                    }
                }
            };

            match next {
                Some(pending) => {
                    trace!("manual scheduler: running task due at {:?}", pending.due);
                    (pending.task)();
                    ran += 1;
                }
                None => break,
            }
        }

        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let mut clock = self.clock.lock();
        let due = clock.now + delay;
        let seq = clock.next_seq;
        clock.next_seq += 1;
        clock.pending.push(Pending { due, seq, task });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |label: &'static str| -> Task {
            let log = log_clone.clone();
            Box::new(move || log.lock().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_manual_runs_only_due_tasks() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.schedule(Duration::from_millis(50), task("a"));
        scheduler.schedule(Duration::from_millis(100), task("b"));

        assert_eq!(scheduler.advance(Duration::from_millis(49)), 0);
        assert!(log.lock().is_empty());

        assert_eq!(scheduler.advance(Duration::from_millis(1)), 1);
        assert_eq!(*log.lock(), vec!["a"]);
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(Duration::from_millis(60));
        assert_eq!(*log.lock(), vec!["a", "b"]);
        assert_eq!(scheduler.now(), Duration::from_millis(110));
    }

    #[test]
    fn test_manual_orders_by_due_then_insertion() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.schedule(Duration::from_millis(30), task("late"));
        scheduler.schedule(Duration::from_millis(10), task("first"));
        scheduler.schedule(Duration::from_millis(10), task("second"));

        scheduler.advance(Duration::from_millis(30));
        assert_eq!(*log.lock(), vec!["first", "second", "late"]);
    }

    #[test]
    fn test_manual_zero_delay_runs_on_next_advance() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.schedule(Duration::ZERO, task("now"));
        assert!(log.lock().is_empty());

        scheduler.advance(Duration::ZERO);
        assert_eq!(*log.lock(), vec!["now"]);
    }

    #[tokio::test]
    async fn test_tokio_scheduler_fires_after_delay() {
        let scheduler = TokioScheduler::current().expect("inside a runtime");
        let (tx, rx) = tokio::sync::oneshot::channel();

        scheduler.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );

        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("task fired")
            .expect("sender kept");
    }

    #[test]
    fn test_tokio_scheduler_requires_runtime() {
        assert!(TokioScheduler::current().is_none());
    }
}
