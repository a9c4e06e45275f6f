//! sysfs pseudo-file access

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::trace;
use sysgpio_core::fs::{select_root, Filesystem, GPIO_ROOTS};

/// Filesystem access through `std::fs`
///
/// sysfs attributes are served from kernel memory, so each access completes
/// without waiting on storage and runs inline on the calling task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysfsFilesystem;

impl SysfsFilesystem {
    /// Create a new sysfs accessor
    pub fn new() -> Self {
        Self
    }
}

impl Filesystem for SysfsFilesystem {
    async fn read_text(&self, path: &Path) -> io::Result<String> {
        let text = fs::read_to_string(path)?;
        trace!("read {} -> {:?}", path.display(), text.trim_end());
        Ok(text)
    }

    async fn write_text(&self, path: &Path, text: &str) -> io::Result<()> {
        // sysfs attributes must exist already; never create regular files
        let mut file = OpenOptions::new().write(true).open(path)?;
        file.write_all(text.as_bytes())?;
        trace!("write {} <- {:?}", path.display(), text);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }
}

/// Detect the GPIO root of the running system
pub fn detect_root() -> PathBuf {
    select_root(&SysfsFilesystem, &GPIO_ROOTS)
}
