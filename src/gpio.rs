//! Channel I/O engine
//!
//! Maps channels to pins and performs the sysfs handshake: export, direction,
//! edge, value and unexport. Validation happens before the first filesystem
//! call, so an invalid request never causes a partial write.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use sysgpio_core::board::{build_mapping, resolve_revision, PinMapping, Revision};
use sysgpio_core::error::is_already_exported;
use sysgpio_core::fs::{select_root, Filesystem, GpioPaths, GPIO_ROOTS};
use sysgpio_core::{Channel, Direction, Edge, GpioError, Pin, Result, Signal};

use crate::channel::{lock, ChannelState};
use crate::config::Config;
use crate::scheduler::{Scheduler, TokioScheduler};

/// GPIO engine over a filesystem collaborator and a scheduler
///
/// All I/O operations are asynchronous. Operations on one channel issued in
/// sequence are applied in order; different channels are independent.
pub struct Gpio<F: Filesystem, S: Scheduler = TokioScheduler> {
    pub(crate) fs: Arc<F>,
    pub(crate) scheduler: Arc<S>,
    pub(crate) config: Config,
    revision: Revision,
    mapping: PinMapping,
    paths: GpioPaths,
    channels: Mutex<BTreeMap<Channel, Arc<ChannelState<S::Handle>>>>,
    opened: Mutex<BTreeSet<Channel>>,
}

impl<F: Filesystem> Gpio<F> {
    /// Create an engine using tokio timers
    pub async fn new(fs: F, config: Config) -> Result<Self> {
        Self::with_scheduler(fs, TokioScheduler::new(), config).await
    }
}

impl<F: Filesystem, S: Scheduler> Gpio<F, S> {
    /// Create an engine with an explicit scheduler
    ///
    /// Resolves the board revision from `config.cpuinfo` and the GPIO root
    /// from `config.root` or, when unset, from the candidates present on `fs`.
    pub async fn with_scheduler(fs: F, scheduler: S, config: Config) -> Result<Self> {
        config.validate()?;

        let revision = resolve_revision(&fs, &config.cpuinfo, config.default_revision).await;
        let mapping = build_mapping(revision);
        let root = match &config.root {
            Some(root) => root.clone(),
            None => select_root(&fs, &GPIO_ROOTS),
        };

        info!(
            "GPIO root {}, board revision {}, {} channels",
            root.display(),
            revision,
            mapping.len()
        );

        Ok(Self {
            fs: Arc::new(fs),
            scheduler: Arc::new(scheduler),
            config,
            revision,
            mapping,
            paths: GpioPaths::new(root),
            channels: Mutex::new(BTreeMap::new()),
            opened: Mutex::new(BTreeSet::new()),
        })
    }

    /// Replace the channel to pin table
    ///
    /// Channels that are open keep the pin they were opened with until they
    /// are closed.
    pub fn with_mapping(mut self, mapping: PinMapping) -> Self {
        self.mapping = mapping;
        let opened = lock(&self.opened).clone();
        lock(&self.channels).retain(|channel, _| opened.contains(channel));
        self
    }

    /// Resolved board revision
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Channel to pin table in use
    pub fn mapping(&self) -> &PinMapping {
        &self.mapping
    }

    /// Pin a channel maps to
    pub fn pin(&self, channel: Channel) -> Result<Pin> {
        self.mapping.lookup(channel)
    }

    /// Timer collaborator
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Check if the channel is mapped
    pub fn has_channel(&self, channel: Channel) -> bool {
        self.mapping.contains(channel)
    }

    /// GPIO root directory
    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Filesystem collaborator
    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    /// Channels opened through this engine and not closed yet
    pub fn open_channels(&self) -> Vec<Channel> {
        lock(&self.opened).iter().copied().collect()
    }

    /// Export the channel's pin, set its direction and drive outputs low
    pub async fn open(&self, channel: Channel, direction: Direction) -> Result<()> {
        let state = self.state(channel)?;
        info!(
            "Opening channel {} (pin {}) as {}",
            channel, state.pin, direction
        );

        self.export(state.pin).await?;
        self.write_direction(&state, direction).await?;
        if direction == Direction::Out {
            self.write_signal(&state, Signal::Low).await?;
        }

        lock(&self.opened).insert(channel);
        Ok(())
    }

    /// Stop timing jobs, drive the output low, then unexport the pin
    pub async fn close(&self, channel: Channel) -> Result<()> {
        let state = self.state(channel)?;
        info!("Closing channel {} (pin {})", channel, state.pin);

        state.read_job().cancel(&*self.scheduler, channel);
        {
            let mut job = state.write.lock().await;
            job.cancel(&*self.scheduler, channel);
            if state.direction() != Some(Direction::In) {
                self.fs
                    .write_text(&state.value_path, Signal::Low.as_str())
                    .await?;
            }
        }

        self.fs
            .write_text(&self.paths.unexport(), &state.pin.to_string())
            .await?;

        // The state stays registered so a request racing with this close
        // still starts its job where a later close can stop it
        state.forget_direction();
        lock(&self.opened).remove(&channel);
        if self.mapping.lookup(channel).ok() != Some(state.pin) {
            lock(&self.channels).remove(&channel);
        }
        Ok(())
    }

    /// Close every channel opened through this engine
    ///
    /// Keeps going after a failure and returns the first error.
    pub async fn close_all(&self) -> Result<()> {
        let mut first_error = None;
        for channel in self.open_channels() {
            if let Err(e) = self.close(channel).await {
                warn!("Failed to close channel {}: {}", channel, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Read the direction pseudo-file
    pub async fn get_direction(&self, channel: Channel) -> Result<Direction> {
        let pin = self.state(channel)?.pin;
        let text = self.fs.read_text(&self.paths.direction(pin)).await?;
        text.trim().parse()
    }

    /// Write the direction pseudo-file
    pub async fn set_direction(&self, channel: Channel, direction: Direction) -> Result<()> {
        let state = self.state(channel)?;
        self.write_direction(&state, direction).await
    }

    /// Read the edge pseudo-file
    pub async fn get_edge(&self, channel: Channel) -> Result<Edge> {
        let pin = self.state(channel)?.pin;
        let text = self.fs.read_text(&self.paths.edge(pin)).await?;
        text.trim().parse()
    }

    /// Write the edge pseudo-file
    pub async fn set_edge(&self, channel: Channel, edge: Edge) -> Result<()> {
        let pin = self.state(channel)?.pin;
        debug!("Channel {}: edge {}", channel, edge);
        self.fs
            .write_text(&self.paths.edge(pin), edge.as_str())
            .await?;
        Ok(())
    }

    /// Read the value pseudo-file as an integer
    ///
    /// Whatever integer the kernel reports is returned unchanged.
    pub async fn get_value(&self, channel: Channel) -> Result<i64> {
        let state = self.state(channel)?;
        read_level(&*self.fs, &state.value_path).await
    }

    /// Drive the channel high for any non-zero `value`, low for zero
    ///
    /// Stops a running PWM job on the channel first.
    pub async fn set_value(&self, channel: Channel, value: i64) -> Result<()> {
        let state = self.state(channel)?;
        self.write_signal(&state, Signal::from_value(value)).await
    }

    /// Look up the state of a channel, creating it for a mapped channel
    pub(crate) fn state(&self, channel: Channel) -> Result<Arc<ChannelState<S::Handle>>> {
        let mut channels = lock(&self.channels);
        if let Some(state) = channels.get(&channel) {
            return Ok(state.clone());
        }
        let pin = self.mapping.lookup(channel)?;
        let state = Arc::new(ChannelState::new(channel, pin, self.paths.value(pin)));
        channels.insert(channel, state.clone());
        Ok(state)
    }

    /// Stop any PWM job and write a level, as one step on the output lane
    pub(crate) async fn write_signal(
        &self,
        state: &ChannelState<S::Handle>,
        signal: Signal,
    ) -> Result<()> {
        let mut job = state.write.lock().await;
        job.cancel(&*self.scheduler, state.channel);
        debug!("Channel {}: value {}", state.channel, signal);
        self.fs
            .write_text(&state.value_path, signal.as_str())
            .await?;
        Ok(())
    }

    async fn write_direction(
        &self,
        state: &ChannelState<S::Handle>,
        direction: Direction,
    ) -> Result<()> {
        debug!("Channel {}: direction {}", state.channel, direction);
        self.fs
            .write_text(&self.paths.direction(state.pin), direction.as_str())
            .await?;
        state.set_direction(direction);
        Ok(())
    }

    async fn export(&self, pin: Pin) -> Result<()> {
        match self
            .fs
            .write_text(&self.paths.export(), &pin.to_string())
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if self.config.tolerate_exported && is_already_exported(&e) => {
                debug!("Pin {} already exported", pin);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Read and parse a value pseudo-file
pub(crate) async fn read_level<F: Filesystem + ?Sized>(fs: &F, path: &Path) -> Result<i64> {
    let text = fs.read_text(path).await?;
    let text = text.trim();
    text.parse()
        .map_err(|_| GpioError::InvalidValue(text.to_string()))
}
