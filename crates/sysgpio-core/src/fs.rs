//! Filesystem collaborator and sysfs GPIO path layout
//!
//! Every GPIO operation is a read or write of a small text pseudo-file. The
//! [`Filesystem`] trait abstracts that access so the engine can run against
//! the kernel (`sysgpio-sysfs`) or an emulator (`sysgpio-dummy`).

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::Pin;

/// Legacy GPIO mount point, preferred when present
pub const LEGACY_GPIO_ROOT: &str = "/sys/devices/virtual/gpio";

/// Standard GPIO class mount point
pub const CLASS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Candidate roots in order of preference
pub const GPIO_ROOTS: [&str; 2] = [LEGACY_GPIO_ROOT, CLASS_GPIO_ROOT];

/// Text file access used for every GPIO operation
///
/// Implementations must surface the host's `io::Error` unchanged.
pub trait Filesystem: Send + Sync + 'static {
    /// Read a whole file as text
    fn read_text(&self, path: &Path) -> impl Future<Output = io::Result<String>> + Send;

    /// Replace the contents of a file with `text`
    fn write_text(&self, path: &Path, text: &str) -> impl Future<Output = io::Result<()>> + Send;

    /// Check whether a path exists
    fn exists(&self, path: &Path) -> bool;
}

/// Pick the first candidate root that exists, falling back to the last one
pub fn select_root<F: Filesystem + ?Sized>(fs: &F, candidates: &[&str]) -> PathBuf {
    let root = candidates
        .iter()
        .find(|c| fs.exists(Path::new(c)))
        .or(candidates.last())
        .copied()
        .unwrap_or(CLASS_GPIO_ROOT);
    log::debug!("Using GPIO root {}", root);
    PathBuf::from(root)
}

/// Paths of the GPIO control files under a root directory
///
/// Per-pin files live in `<root>/gpio<pin>/<resource>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioPaths {
    root: PathBuf,
}

impl GpioPaths {
    /// Create a path layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Export control file
    pub fn export(&self) -> PathBuf {
        self.root.join("export")
    }

    /// Unexport control file
    pub fn unexport(&self) -> PathBuf {
        self.root.join("unexport")
    }

    /// Directory created by the kernel for an exported pin
    pub fn pin_dir(&self, pin: Pin) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    /// Direction pseudo-file of a pin
    pub fn direction(&self, pin: Pin) -> PathBuf {
        self.pin_dir(pin).join("direction")
    }

    /// Edge pseudo-file of a pin
    pub fn edge(&self, pin: Pin) -> PathBuf {
        self.pin_dir(pin).join("edge")
    }

    /// Value pseudo-file of a pin
    pub fn value(&self, pin: Pin) -> PathBuf {
        self.pin_dir(pin).join("value")
    }
}
