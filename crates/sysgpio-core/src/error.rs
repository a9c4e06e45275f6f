//! Error types for sysgpio
//!
//! Validation failures (unknown channel, direction or edge, out of range
//! analog parameters) are raised before any filesystem access. Filesystem
//! failures are carried as the host's `io::Error`, unchanged.

use std::io;
use thiserror::Error;

use crate::types::Channel;

/// Errors produced by channel mapping, digital I/O and analog emulation
#[derive(Debug, Error)]
pub enum GpioError {
    /// Channel is not present in the resolved pin mapping
    #[error("Unknown channel {0}")]
    UnknownChannel(Channel),

    /// Direction is not one of "in" or "out"
    #[error("Unknown direction {0}")]
    UnknownDirection(String),

    /// Edge is not one of "none", "rising", "falling" or "both"
    #[error("Unknown edge {0}")]
    UnknownEdge(String),

    /// Failure reported by the filesystem collaborator
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The value pseudo-file did not hold an integer
    #[error("Invalid value read from GPIO: {0:?}")]
    InvalidValue(String),

    /// Analog output value is neither a whole number nor a fraction in [0, 1]
    #[error("Invalid duty cycle {0}: expected a whole number or a fraction in [0, 1]")]
    InvalidDutyCycle(f64),

    /// PWM frequency gives an empty frame
    #[error("Invalid PWM frequency {0} Hz")]
    InvalidFrequency(u32),

    /// The sampling window ended without enough samples to compute a ratio
    #[error("No samples collected on channel {channel}")]
    NoSamples {
        /// Channel that was sampled
        channel: Channel,
    },

    /// A timing job was replaced or the channel closed before it completed
    #[error("Timing job on channel {channel} was cancelled")]
    Cancelled {
        /// Channel whose job was cancelled
        channel: Channel,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GpioError {
    /// Check whether this is a validation error raised before any I/O
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownChannel(_)
                | Self::UnknownDirection(_)
                | Self::UnknownEdge(_)
                | Self::InvalidDutyCycle(_)
                | Self::InvalidFrequency(_)
        )
    }
}

/// Check whether an export failure means the pin is already exported
///
/// The kernel answers a second export of the same pin with `EBUSY`.
pub fn is_already_exported(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EBUSY) || err.kind() == io::ErrorKind::AlreadyExists
}

/// Result type for sysgpio operations
pub type Result<T> = std::result::Result<T, GpioError>;
