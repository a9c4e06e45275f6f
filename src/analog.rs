//! Analog emulation on digital pins
//!
//! Output is software PWM: a periodic task drives the pin high at the start
//! of every frame and a one-shot task drives it low after the duty portion.
//! Input is oversampling: the value file is read every config frame and the
//! fraction of time spent high is reported at the end of the window.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, trace, warn};
use sysgpio_core::fs::Filesystem;
use sysgpio_core::{Channel, GpioError, Result, Signal};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::channel::{lock, ChannelState, WriteJob};
use crate::gpio::{read_level, Gpio};
use crate::scheduler::{PeriodicTask, Scheduler, TaskFuture};

/// One reading of the value file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// When the reading was taken
    pub at: Instant,
    /// Level read, or carried forward from the previous sample
    pub signal: i64,
}

/// Fraction of time spent high over a set of samples
///
/// Samples are sorted by timestamp first. Each sample contributes the time
/// elapsed since its predecessor to its own level; the first contributes
/// nothing. Returns `None` when the samples span no time at all.
pub fn duty_cycle(samples: &mut [Sample]) -> Option<f64> {
    samples.sort_by_key(|s| s.at);

    let mut high = Duration::ZERO;
    let mut low = Duration::ZERO;
    for pair in samples.windows(2) {
        let elapsed = pair[1].at - pair[0].at;
        if pair[1].signal != 0 {
            high += elapsed;
        } else {
            low += elapsed;
        }
    }

    let total = high + low;
    if total.is_zero() {
        return None;
    }
    Some(high.as_secs_f64() / total.as_secs_f64())
}

/// What a `set_analog_value` request turns into
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Drive {
    /// Whole number: a plain digital write
    Level(Signal),
    /// Duty cycle: high for `high` out of every `frame`
    Pwm { frame: Duration, high: Duration },
}

/// Validate an analog value and compute its PWM timing
///
/// A fraction whose high time rounds to nothing or to the whole frame is
/// driven as a constant level.
pub(crate) fn plan_drive(value: f64, frequency_hz: u32) -> Result<Drive> {
    if !value.is_finite() {
        return Err(GpioError::InvalidDutyCycle(value));
    }
    if value.fract() == 0.0 {
        return Ok(Drive::Level(Signal::from(value != 0.0)));
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(GpioError::InvalidDutyCycle(value));
    }

    let frame_ms = pwm_frame(frequency_hz)?;
    let high_ms = (frame_ms as f64 * value).round() as u64;
    // No room for both phases within one frame
    if high_ms == 0 {
        return Ok(Drive::Level(Signal::Low));
    }
    if high_ms >= frame_ms {
        return Ok(Drive::Level(Signal::High));
    }
    Ok(Drive::Pwm {
        frame: Duration::from_millis(frame_ms),
        high: Duration::from_millis(high_ms),
    })
}

/// PWM period in whole milliseconds for a frequency
pub(crate) fn pwm_frame(frequency_hz: u32) -> Result<u64> {
    if frequency_hz == 0 {
        return Err(GpioError::InvalidFrequency(frequency_hz));
    }
    let frame = (1000.0 / f64::from(frequency_hz)).round() as u64;
    if frame == 0 {
        return Err(GpioError::InvalidFrequency(frequency_hz));
    }
    Ok(frame)
}

impl<F: Filesystem, S: Scheduler> Gpio<F, S> {
    /// Emulate an analog output level
    ///
    /// A whole `value` is written as a digital level. A fraction in `[0, 1]`
    /// starts software PWM at `frequency_hz` (the configured default when
    /// `None`) that runs until `close`, `set_value` or another call to this
    /// method. A fraction that rounds to an empty or full high phase is
    /// written as a constant level. Resolves once the first high/low pair
    /// has been written, or with [`GpioError::Cancelled`] if the job is
    /// replaced before that.
    pub async fn set_analog_value(
        &self,
        channel: Channel,
        value: f64,
        frequency_hz: Option<u32>,
    ) -> Result<()> {
        let state = self.state(channel)?;
        let frequency = frequency_hz.unwrap_or(self.config.frequency);
        let (frame, high) = match plan_drive(value, frequency)? {
            Drive::Level(signal) => return self.write_signal(&state, signal).await,
            Drive::Pwm { frame, high } => (frame, high),
        };

        let receiver = {
            let mut job = state.write.lock().await;
            job.cancel(&*self.scheduler, channel);

            let (sender, receiver) = oneshot::channel();
            job.completion = Some(sender);
            let tick = pwm_tick(
                self.fs.clone(),
                self.scheduler.clone(),
                state.clone(),
                job.epoch,
                high,
            );
            job.periodic = Some(self.scheduler.schedule_periodic(frame, tick));
            receiver
        };

        info!(
            "Channel {}: PWM duty {:.3} at {} Hz ({:?} high every {:?})",
            channel, value, frequency, high, frame
        );

        receiver
            .await
            .unwrap_or(Err(GpioError::Cancelled { channel }))
    }

    /// Measure the fraction of time a channel reads high
    ///
    /// Samples the value file every configured frame for `duration` (the
    /// configured default when `None`). A failed read repeats the previous
    /// sample. Fails with [`GpioError::NoSamples`] if the window was too short
    /// to collect two samples.
    pub async fn get_analog_value(
        &self,
        channel: Channel,
        duration: Option<Duration>,
    ) -> Result<f64> {
        let state = self.state(channel)?;
        let duration = duration.unwrap_or_else(|| self.config.sample_window());
        let frame = self.config.frame_duration();

        let receiver = {
            let mut job = state.read_job();
            job.cancel(&*self.scheduler, channel);

            let (sender, receiver) = oneshot::channel();
            job.completion = Some(sender);
            let samples = Arc::new(Mutex::new(Vec::new()));
            let sampler = sample_tick(
                self.fs.clone(),
                self.scheduler.clone(),
                state.clone(),
                job.epoch,
                samples.clone(),
            );
            job.sampler = Some(self.scheduler.schedule_periodic(frame, sampler));
            let finalizer =
                finish_sampling(self.scheduler.clone(), state.clone(), job.epoch, samples);
            job.finalizer = Some(self.scheduler.schedule_once(duration, finalizer));
            receiver
        };

        debug!(
            "Channel {}: sampling every {:?} for {:?}",
            channel, frame, duration
        );

        receiver
            .await
            .unwrap_or(Err(GpioError::Cancelled { channel }))
    }
}

/// Start of a PWM frame: drive high and schedule the low phase
fn pwm_tick<F: Filesystem, S: Scheduler>(
    fs: Arc<F>,
    scheduler: Arc<S>,
    state: Arc<ChannelState<S::Handle>>,
    epoch: u64,
    high: Duration,
) -> PeriodicTask {
    Box::new(move || -> TaskFuture {
        let fs = fs.clone();
        let scheduler = scheduler.clone();
        let state = state.clone();
        Box::pin(async move {
            let mut job = state.write.lock().await;
            if job.epoch != epoch {
                return;
            }

            // The previous low phase is overdue: finish that frame first
            if let Some(late) = job.low.take() {
                scheduler.cancel(&late);
                if let Err(e) = end_high_phase(&mut *job, &*fs, &*state).await {
                    abort_pwm(&mut *job, &*scheduler, state.channel, e);
                    return;
                }
            }

            if let Err(e) = fs
                .write_text(&state.value_path, Signal::High.as_str())
                .await
            {
                abort_pwm(&mut *job, &*scheduler, state.channel, e.into());
                return;
            }
            trace!("Channel {}: PWM high", state.channel);

            job.cycle = job.cycle.wrapping_add(1);
            let low = pwm_low(
                fs.clone(),
                scheduler.clone(),
                state.clone(),
                epoch,
                job.cycle,
            );
            job.low = Some(scheduler.schedule_once(high, low));
        })
    })
}

/// End of the high phase of frame `cycle`
fn pwm_low<F: Filesystem, S: Scheduler>(
    fs: Arc<F>,
    scheduler: Arc<S>,
    state: Arc<ChannelState<S::Handle>>,
    epoch: u64,
    cycle: u64,
) -> TaskFuture {
    Box::pin(async move {
        let mut job = state.write.lock().await;
        if job.epoch != epoch || job.cycle != cycle || job.low.is_none() {
            return;
        }
        job.low = None;
        if let Err(e) = end_high_phase(&mut *job, &*fs, &*state).await {
            abort_pwm(&mut *job, &*scheduler, state.channel, e);
        }
    })
}

/// Drive low and resolve the caller after the first complete frame
async fn end_high_phase<F: Filesystem, H>(
    job: &mut WriteJob<H>,
    fs: &F,
    state: &ChannelState<H>,
) -> Result<()> {
    fs.write_text(&state.value_path, Signal::Low.as_str())
        .await?;
    trace!("Channel {}: PWM low", state.channel);
    if job.resolve(Ok(())) {
        debug!("Channel {}: first PWM cycle written", state.channel);
    }
    Ok(())
}

/// Stop a PWM job after a failed write
fn abort_pwm<S: Scheduler>(
    job: &mut WriteJob<S::Handle>,
    scheduler: &S,
    channel: Channel,
    error: GpioError,
) {
    match job.stop(scheduler) {
        Some(completion) => {
            let _ = completion.send(Err(error));
        }
        None => warn!("Channel {}: PWM stopped: {}", channel, error),
    }
}

/// One oversampling read
fn sample_tick<F: Filesystem, S: Scheduler>(
    fs: Arc<F>,
    scheduler: Arc<S>,
    state: Arc<ChannelState<S::Handle>>,
    epoch: u64,
    samples: Arc<Mutex<Vec<Sample>>>,
) -> PeriodicTask {
    Box::new(move || -> TaskFuture {
        let fs = fs.clone();
        let scheduler = scheduler.clone();
        let state = state.clone();
        let samples = samples.clone();
        Box::pin(async move {
            let current = state.read_job().epoch;
            if current != epoch {
                return;
            }

            let at = scheduler.now();
            let signal = match read_level(&*fs, &state.value_path).await {
                Ok(level) => level,
                Err(e) => {
                    let previous = lock(&samples).last().map_or(0, |s| s.signal);
                    debug!(
                        "Channel {}: sample failed ({}), repeating {}",
                        state.channel, e, previous
                    );
                    previous
                }
            };
            trace!("Channel {}: sample {}", state.channel, signal);
            lock(&samples).push(Sample { at, signal });
        })
    })
}

/// End of the sampling window
fn finish_sampling<S: Scheduler>(
    scheduler: Arc<S>,
    state: Arc<ChannelState<S::Handle>>,
    epoch: u64,
    samples: Arc<Mutex<Vec<Sample>>>,
) -> TaskFuture {
    Box::pin(async move {
        let completion = {
            let mut job = state.read_job();
            if job.epoch != epoch {
                return;
            }
            job.stop(&*scheduler)
        };

        let mut samples = std::mem::take(&mut *lock(&samples));
        let result = duty_cycle(&mut samples).ok_or(GpioError::NoSamples {
            channel: state.channel,
        });
        match &result {
            Ok(ratio) => debug!(
                "Channel {}: {} samples, duty {:.3}",
                state.channel,
                samples.len(),
                ratio
            ),
            Err(e) => debug!("Channel {}: {}", state.channel, e),
        }

        if let Some(completion) = completion {
            let _ = completion.send(result);
        }
    })
}
