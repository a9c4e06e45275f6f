//! Per-channel runtime state
//!
//! A channel owns at most one output timing job (PWM) and at most one input
//! timing job (oversampling). Starting a job stops the previous one first.
//! Each job carries an epoch: timer callbacks compare it under the job lock
//! and do nothing once the job they belong to has been stopped.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use sysgpio_core::{Channel, Direction, GpioError, Pin, Result};
use tokio::sync::oneshot;

use crate::scheduler::Scheduler;

/// Runtime state of one channel
pub(crate) struct ChannelState<H> {
    pub channel: Channel,
    pub pin: Pin,
    pub value_path: PathBuf,
    /// Direction last set through the engine
    direction: Mutex<Option<Direction>>,
    /// Output lane: every write to `value` happens under this lock
    pub write: tokio::sync::Mutex<WriteJob<H>>,
    pub read: Mutex<ReadJob<H>>,
}

impl<H> ChannelState<H> {
    pub fn new(channel: Channel, pin: Pin, value_path: PathBuf) -> Self {
        Self {
            channel,
            pin,
            value_path,
            direction: Mutex::new(None),
            write: tokio::sync::Mutex::new(WriteJob::default()),
            read: Mutex::new(ReadJob::default()),
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        *lock(&self.direction)
    }

    pub fn set_direction(&self, direction: Direction) {
        *lock(&self.direction) = Some(direction);
    }

    pub fn forget_direction(&self) {
        *lock(&self.direction) = None;
    }

    pub fn read_job(&self) -> MutexGuard<'_, ReadJob<H>> {
        lock(&self.read)
    }
}

/// Software PWM job
pub(crate) struct WriteJob<H> {
    pub epoch: u64,
    /// Frame counter; a low phase only acts on the frame that scheduled it
    pub cycle: u64,
    /// Periodic "high" phase
    pub periodic: Option<H>,
    /// Low phase of the current frame, until it runs
    pub low: Option<H>,
    /// Resolved after the first high/low pair
    pub completion: Option<oneshot::Sender<Result<()>>>,
}

impl<H> Default for WriteJob<H> {
    fn default() -> Self {
        Self {
            epoch: 0,
            cycle: 0,
            periodic: None,
            low: None,
            completion: None,
        }
    }
}

impl<H> WriteJob<H> {
    /// Stop the timers and invalidate pending callbacks
    ///
    /// Returns the completion of the stopped job if it had not resolved yet.
    pub fn stop<S>(&mut self, scheduler: &S) -> Option<oneshot::Sender<Result<()>>>
    where
        S: Scheduler<Handle = H>,
    {
        self.epoch = self.epoch.wrapping_add(1);
        for handle in [self.periodic.take(), self.low.take()].into_iter().flatten() {
            scheduler.cancel(&handle);
        }
        self.completion.take()
    }

    /// Stop the job, failing its caller with `Cancelled` if still waiting
    pub fn cancel<S>(&mut self, scheduler: &S, channel: Channel)
    where
        S: Scheduler<Handle = H>,
    {
        let active = self.periodic.is_some();
        if let Some(completion) = self.stop(scheduler) {
            let _ = completion.send(Err(GpioError::Cancelled { channel }));
        }
        if active {
            log::debug!("Cancelled PWM on channel {}", channel);
        }
    }

    /// Resolve the completion once; later results are dropped
    pub fn resolve(&mut self, result: Result<()>) -> bool {
        match self.completion.take() {
            Some(completion) => {
                let _ = completion.send(result);
                true
            }
            None => false,
        }
    }
}

/// Oversampling job
pub(crate) struct ReadJob<H> {
    pub epoch: u64,
    pub sampler: Option<H>,
    pub finalizer: Option<H>,
    pub completion: Option<oneshot::Sender<Result<f64>>>,
}

impl<H> Default for ReadJob<H> {
    fn default() -> Self {
        Self {
            epoch: 0,
            sampler: None,
            finalizer: None,
            completion: None,
        }
    }
}

impl<H> ReadJob<H> {
    /// Stop the timers and invalidate pending callbacks
    pub fn stop<S>(&mut self, scheduler: &S) -> Option<oneshot::Sender<Result<f64>>>
    where
        S: Scheduler<Handle = H>,
    {
        self.epoch = self.epoch.wrapping_add(1);
        for handle in [self.sampler.take(), self.finalizer.take()]
            .into_iter()
            .flatten()
        {
            scheduler.cancel(&handle);
        }
        self.completion.take()
    }

    /// Stop the job, failing its caller with `Cancelled` if still waiting
    pub fn cancel<S>(&mut self, scheduler: &S, channel: Channel)
    where
        S: Scheduler<Handle = H>,
    {
        if let Some(completion) = self.stop(scheduler) {
            log::debug!("Cancelled sampling on channel {}", channel);
            let _ = completion.send(Err(GpioError::Cancelled { channel }));
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
