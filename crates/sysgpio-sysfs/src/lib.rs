//! sysgpio-sysfs - Linux sysfs GPIO access
//!
//! This crate provides the production [`Filesystem`] used by sysgpio: plain
//! reads and writes of the pseudo-files the kernel exposes under
//! `/sys/class/gpio` (or the legacy `/sys/devices/virtual/gpio`).
//!
//! # System Requirements
//!
//! - Linux kernel with `CONFIG_GPIO_SYSFS`
//! - Write access to the `export`/`unexport` files and to the exported
//!   `gpioN` directories (may require root or udev rules)
//!
//! # Manual equivalent
//!
//! ```bash
//! echo 4 > /sys/class/gpio/export
//! echo out > /sys/class/gpio/gpio4/direction
//! echo 1 > /sys/class/gpio/gpio4/value
//! echo 4 > /sys/class/gpio/unexport
//! ```

mod device;

pub use device::{detect_root, SysfsFilesystem};

pub use sysgpio_core::fs::Filesystem;
