//! sysgpio - Channel-numbered GPIO over Linux sysfs
//!
//! Drives GPIO pins through the kernel's sysfs interface using physical
//! header channel numbers, with two analog emulations on top of plain
//! digital I/O:
//!
//! - software PWM output ([`Gpio::set_analog_value`])
//! - oversampled input reporting the fraction of time a pin was high
//!   ([`Gpio::get_analog_value`])
//!
//! The engine is generic over its two collaborators: a [`Filesystem`]
//! (`sysgpio-sysfs` for the kernel, `sysgpio-dummy` for tests) and a
//! [`Scheduler`] for timers ([`TokioScheduler`] by default).
//!
//! # Example
//!
//! ```no_run
//! use sysgpio::{Config, Direction};
//!
//! # async fn blink() -> sysgpio::Result<()> {
//! let gpio = sysgpio::open_sysfs(Config::from_env()?).await?;
//! gpio.open(7, Direction::Out).await?;
//! gpio.set_value(7, 1).await?;
//! gpio.set_analog_value(12, 0.25, Some(200)).await?;
//! let level = gpio.get_analog_value(11, None).await?;
//! log::info!("channel 11 was high {:.0}% of the time", level * 100.0);
//! gpio.close_all().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod analog;
mod channel;
pub mod config;
mod gpio;
pub mod scheduler;

pub use analog::{duty_cycle, Sample};
pub use config::Config;
pub use gpio::Gpio;
pub use scheduler::{Scheduler, TokioScheduler};

pub use sysgpio_core::board::{self, PinMapping, Revision};
pub use sysgpio_core::fs::{Filesystem, GpioPaths};
pub use sysgpio_core::{Channel, Direction, Edge, GpioError, Pin, Result, Signal};
pub use sysgpio_sysfs::SysfsFilesystem;

/// Create an engine on the running system's sysfs GPIO controller
pub async fn open_sysfs(config: Config) -> Result<Gpio<SysfsFilesystem>> {
    Gpio::new(SysfsFilesystem::new(), config).await
}
