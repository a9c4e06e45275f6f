//! sysgpio-core - Channel mapping and shared types for sysgpio
//!
//! This crate holds the parts of sysgpio that do not depend on a runtime:
//!
//! - [`board`]: board revision detection and the channel to pin tables
//! - [`types`]: channels, pins, directions, edges and signal levels
//! - [`fs`]: the [`Filesystem`](fs::Filesystem) collaborator trait and the
//!   sysfs GPIO path layout
//! - [`error`]: the error type shared by every sysgpio crate
//!
//! # Example
//!
//! ```
//! use sysgpio_core::board::{build_mapping, revision_from_cpuinfo, DEFAULT_REVISION};
//!
//! let revision = revision_from_cpuinfo("Revision : 0010").unwrap_or(DEFAULT_REVISION);
//! let mapping = build_mapping(revision);
//! assert_eq!(mapping.lookup(7).unwrap(), 4);
//! assert!(mapping.lookup(30).is_err());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod board;
pub mod error;
pub mod fs;
pub mod types;

pub use error::{GpioError, Result};
pub use types::{Channel, Direction, Edge, Pin, Signal};
