//! Timer collaborator
//!
//! PWM output and oversampled input are driven by two primitives: a
//! cancellable periodic task and a cancellable one-shot task. The engine only
//! talks to the [`Scheduler`] trait; [`TokioScheduler`] implements it on the
//! tokio runtime, whose paused clock makes timer behavior deterministic in
//! tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Future run by a timer
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Factory invoked on every tick of a periodic timer
pub type PeriodicTask = Box<dyn FnMut() -> TaskFuture + Send + 'static>;

/// Periodic and one-shot timers
pub trait Scheduler: Send + Sync + 'static {
    /// Handle identifying a scheduled timer
    type Handle: Send + Sync + 'static;

    /// Run `task` every `interval`, first after one full interval
    fn schedule_periodic(&self, interval: Duration, task: PeriodicTask) -> Self::Handle;

    /// Run `task` once after `delay`
    fn schedule_once(&self, delay: Duration, task: TaskFuture) -> Self::Handle;

    /// Stop a timer; a timer that already fired or was cancelled is ignored
    fn cancel(&self, handle: &Self::Handle);

    /// Current time on the scheduler's clock
    fn now(&self) -> Instant;
}

/// Scheduler backed by tokio tasks
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    /// Create a tokio scheduler
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for TokioScheduler {
    type Handle = AbortHandle;

    fn schedule_periodic(&self, interval: Duration, mut task: PeriodicTask) -> AbortHandle {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                task().await;
            }
        });
        handle.abort_handle()
    }

    fn schedule_once(&self, delay: Duration, task: TaskFuture) -> AbortHandle {
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            task.await;
        });
        handle.abort_handle()
    }

    fn cancel(&self, handle: &AbortHandle) {
        handle.abort();
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
