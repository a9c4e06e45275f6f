//! sysgpio-dummy - In-memory sysfs GPIO emulator for testing
//!
//! This crate provides a [`Filesystem`] that behaves like the kernel's sysfs
//! GPIO controller without real hardware:
//!
//! - writing a pin number to `export` creates `gpioN/{direction,edge,value}`
//! - writing it to `unexport` removes them again
//! - exporting an exported pin fails with `EBUSY`, unexporting an unknown
//!   pin fails with `EINVAL`
//! - writing `value` on an input pin fails with `EPERM`
//!
//! Read-only files outside the GPIO tree, such as `/proc/cpuinfo`, can be
//! added with [`DummySysfs::add_file`].
//!
//! Every successful write is recorded with a timestamp taken from
//! `tokio::time::Instant`, so tests running on a paused clock can check
//! exactly when and what was written.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use sysgpio_core::fs::{Filesystem, CLASS_GPIO_ROOT};
use sysgpio_core::types::{Direction, Edge, Pin, Signal};
use tokio::time::Instant;

/// Control files of one exported pin
#[derive(Debug, Clone)]
struct PinFiles {
    direction: Direction,
    edge: Edge,
    value: Signal,
}

impl Default for PinFiles {
    fn default() -> Self {
        Self {
            direction: Direction::In,
            edge: Edge::None,
            value: Signal::Low,
        }
    }
}

/// One successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// When the write happened
    pub at: Instant,
    /// File written
    pub path: PathBuf,
    /// Text written
    pub text: String,
}

#[derive(Debug, Default)]
struct State {
    pins: BTreeMap<Pin, PinFiles>,
    writes: Vec<WriteRecord>,
    failing_reads: usize,
    files: BTreeMap<PathBuf, String>,
}

/// Resolved target of a path below the root
enum Node {
    Root,
    Export,
    Unexport,
    PinDir(Pin),
    Attr(Pin, Attr),
}

#[derive(Clone, Copy)]
enum Attr {
    Direction,
    Edge,
    Value,
}

/// Emulated sysfs GPIO controller
#[derive(Debug)]
pub struct DummySysfs {
    root: PathBuf,
    state: Mutex<State>,
}

impl Default for DummySysfs {
    fn default() -> Self {
        Self::new(CLASS_GPIO_ROOT)
    }
}

impl DummySysfs {
    /// Create an emulator serving the GPIO tree at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Root the emulator serves
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serve a read-only file at `path`
    pub fn add_file(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.lock().files.insert(path.into(), text.into());
    }

    /// Check whether a pin is exported
    pub fn is_exported(&self, pin: Pin) -> bool {
        self.lock().pins.contains_key(&pin)
    }

    /// Exported pins in ascending order
    pub fn exported(&self) -> Vec<Pin> {
        self.lock().pins.keys().copied().collect()
    }

    /// Drive the level of an exported pin from outside, whatever its direction
    pub fn drive(&self, pin: Pin, signal: Signal) -> io::Result<()> {
        let mut state = self.lock();
        let files = state.pins.get_mut(&pin).ok_or_else(not_found)?;
        files.value = signal;
        Ok(())
    }

    /// Make the next `count` reads of a `value` file fail with `EIO`
    pub fn fail_value_reads(&self, count: usize) {
        self.lock().failing_reads = count;
    }

    /// All successful writes so far
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    /// Successful writes to one file
    pub fn writes_to(&self, path: &Path) -> Vec<WriteRecord> {
        self.lock()
            .writes
            .iter()
            .filter(|w| w.path == path)
            .cloned()
            .collect()
    }

    /// Forget recorded writes
    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the emulator state from others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn resolve(&self, path: &Path) -> Option<Node> {
        let rest = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = rest
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<_>>()?;

        match parts.as_slice() {
            [] => Some(Node::Root),
            ["export"] => Some(Node::Export),
            ["unexport"] => Some(Node::Unexport),
            [dir] => parse_pin_dir(dir).map(Node::PinDir),
            [dir, attr] => {
                let pin = parse_pin_dir(dir)?;
                let attr = match *attr {
                    "direction" => Attr::Direction,
                    "edge" => Attr::Edge,
                    "value" => Attr::Value,
                    _ => return None,
                };
                Some(Node::Attr(pin, attr))
            }
            _ => None,
        }
    }

    fn read_node(&self, path: &Path) -> io::Result<String> {
        let mut state = self.lock();
        if let Some(text) = state.files.get(path) {
            return Ok(text.clone());
        }
        match self.resolve(path) {
            Some(Node::Attr(pin, attr)) => {
                if matches!(attr, Attr::Value) && state.failing_reads > 0 {
                    state.failing_reads -= 1;
                    return Err(io::Error::from_raw_os_error(libc::EIO));
                }
                let files = state.pins.get(&pin).ok_or_else(not_found)?;
                let text = match attr {
                    Attr::Direction => files.direction.as_str(),
                    Attr::Edge => files.edge.as_str(),
                    Attr::Value => files.value.as_str(),
                };
                Ok(format!("{}\n", text))
            }
            // export/unexport are write-only
            Some(Node::Export) | Some(Node::Unexport) => {
                Err(io::Error::from_raw_os_error(libc::EACCES))
            }
            Some(Node::Root) | Some(Node::PinDir(_)) => {
                Err(io::Error::from_raw_os_error(libc::EISDIR))
            }
            None => Err(not_found()),
        }
    }

    fn write_node(&self, path: &Path, text: &str) -> io::Result<()> {
        let mut state = self.lock();
        if state.files.contains_key(path) {
            return Err(io::Error::from_raw_os_error(libc::EACCES));
        }
        let value = text.trim();

        match self.resolve(path) {
            Some(Node::Export) => {
                let pin = parse_pin(value)?;
                if state.pins.contains_key(&pin) {
                    return Err(io::Error::from_raw_os_error(libc::EBUSY));
                }
                state.pins.insert(pin, PinFiles::default());
                log::debug!("dummy: exported pin {}", pin);
            }
            Some(Node::Unexport) => {
                let pin = parse_pin(value)?;
                if state.pins.remove(&pin).is_none() {
                    return Err(invalid());
                }
                log::debug!("dummy: unexported pin {}", pin);
            }
            Some(Node::Attr(pin, attr)) => {
                let files = state.pins.get_mut(&pin).ok_or_else(not_found)?;
                match attr {
                    Attr::Direction => match value {
                        "high" | "low" => {
                            files.direction = Direction::Out;
                            files.value = Signal::from(value == "high");
                        }
                        _ => files.direction = value.parse().map_err(|_| invalid())?,
                    },
                    Attr::Edge => files.edge = value.parse().map_err(|_| invalid())?,
                    Attr::Value => {
                        if files.direction == Direction::In {
                            return Err(io::Error::from_raw_os_error(libc::EPERM));
                        }
                        let level: i64 = value.parse().map_err(|_| invalid())?;
                        files.value = Signal::from_value(level);
                    }
                }
            }
            Some(Node::Root) | Some(Node::PinDir(_)) => {
                return Err(io::Error::from_raw_os_error(libc::EISDIR));
            }
            None => return Err(not_found()),
        }

        state.writes.push(WriteRecord {
            at: Instant::now(),
            path: path.to_path_buf(),
            text: text.to_string(),
        });
        Ok(())
    }
}

impl Filesystem for DummySysfs {
    async fn read_text(&self, path: &Path) -> io::Result<String> {
        self.read_node(path)
    }

    async fn write_text(&self, path: &Path, text: &str) -> io::Result<()> {
        self.write_node(path, text)
    }

    fn exists(&self, path: &Path) -> bool {
        if self.lock().files.contains_key(path) {
            return true;
        }
        match self.resolve(path) {
            Some(Node::Root) | Some(Node::Export) | Some(Node::Unexport) => true,
            Some(Node::PinDir(pin)) | Some(Node::Attr(pin, _)) => self.is_exported(pin),
            None => false,
        }
    }
}

fn parse_pin_dir(name: &str) -> Option<Pin> {
    name.strip_prefix("gpio")?.parse().ok()
}

fn parse_pin(text: &str) -> io::Result<Pin> {
    text.parse().map_err(|_| invalid())
}

fn not_found() -> io::Error {
    io::Error::from_raw_os_error(libc::ENOENT)
}

fn invalid() -> io::Error {
    io::Error::from_raw_os_error(libc::EINVAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysgpio_core::error::is_already_exported;
    use sysgpio_core::fs::GpioPaths;

    fn setup() -> (DummySysfs, GpioPaths) {
        let sysfs = DummySysfs::new("/sys/class/gpio");
        let paths = GpioPaths::new("/sys/class/gpio");
        (sysfs, paths)
    }

    #[tokio::test]
    async fn test_export_creates_pin_files() {
        let (sysfs, paths) = setup();
        assert!(!sysfs.exists(&paths.value(4)));

        sysfs.write_text(&paths.export(), "4").await.unwrap();
        assert!(sysfs.is_exported(4));
        assert!(sysfs.exists(&paths.pin_dir(4)));
        assert_eq!(sysfs.read_text(&paths.direction(4)).await.unwrap(), "in\n");
        assert_eq!(sysfs.read_text(&paths.edge(4)).await.unwrap(), "none\n");
        assert_eq!(sysfs.read_text(&paths.value(4)).await.unwrap(), "0\n");
    }

    #[tokio::test]
    async fn test_double_export_is_busy() {
        let (sysfs, paths) = setup();
        sysfs.write_text(&paths.export(), "4").await.unwrap();
        let err = sysfs.write_text(&paths.export(), "4").await.unwrap_err();
        assert!(is_already_exported(&err));
    }

    #[tokio::test]
    async fn test_unexport_removes_pin_files() {
        let (sysfs, paths) = setup();
        sysfs.write_text(&paths.export(), "17").await.unwrap();
        sysfs.write_text(&paths.unexport(), "17").await.unwrap();
        assert!(!sysfs.is_exported(17));

        let err = sysfs.read_text(&paths.value(17)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let err = sysfs.write_text(&paths.unexport(), "17").await.unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }

    #[tokio::test]
    async fn test_value_write_requires_output() {
        let (sysfs, paths) = setup();
        sysfs.write_text(&paths.export(), "4").await.unwrap();

        let err = sysfs.write_text(&paths.value(4), "1").await.unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EPERM));

        sysfs.write_text(&paths.direction(4), "out").await.unwrap();
        sysfs.write_text(&paths.value(4), "-5").await.unwrap();
        assert_eq!(sysfs.read_text(&paths.value(4)).await.unwrap(), "1\n");
    }

    #[tokio::test]
    async fn test_rejects_unknown_attribute_values() {
        let (sysfs, paths) = setup();
        sysfs.write_text(&paths.export(), "4").await.unwrap();

        let err = sysfs.write_text(&paths.edge(4), "sideways").await.unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
        let err = sysfs.write_text(&paths.direction(4), "up").await.unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }

    #[tokio::test]
    async fn test_drive_and_failing_reads() {
        let (sysfs, paths) = setup();
        sysfs.write_text(&paths.export(), "4").await.unwrap();
        sysfs.drive(4, Signal::High).unwrap();

        sysfs.fail_value_reads(1);
        assert!(sysfs.read_text(&paths.value(4)).await.is_err());
        assert_eq!(sysfs.read_text(&paths.value(4)).await.unwrap(), "1\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_are_recorded() {
        let (sysfs, paths) = setup();
        let start = Instant::now();
        sysfs.write_text(&paths.export(), "4").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        sysfs.write_text(&paths.direction(4), "out").await.unwrap();
        let _ = sysfs.write_text(&paths.export(), "4").await;

        let writes = sysfs.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].at, start);
        assert_eq!(writes[1].at, start + std::time::Duration::from_millis(5));
        assert_eq!(sysfs.writes_to(&paths.direction(4))[0].text, "out");

        sysfs.clear_writes();
        assert!(sysfs.writes().is_empty());
    }

    #[tokio::test]
    async fn test_added_files_are_read_only() {
        let sysfs = DummySysfs::default();
        let cpuinfo = Path::new("/proc/cpuinfo");
        assert!(!sysfs.exists(cpuinfo));

        sysfs.add_file(cpuinfo, "Revision\t: 000e\n");
        assert!(sysfs.exists(cpuinfo));
        assert_eq!(sysfs.read_text(cpuinfo).await.unwrap(), "Revision\t: 000e\n");

        let err = sysfs.write_text(cpuinfo, "x").await.unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EACCES));
        assert!(sysfs.writes().is_empty());
    }

    #[test]
    fn test_paths_outside_root() {
        let sysfs = DummySysfs::default();
        assert!(sysfs.exists(Path::new(CLASS_GPIO_ROOT)));
        assert!(!sysfs.exists(Path::new("/sys/devices/virtual/gpio")));
        assert!(!sysfs.exists(Path::new("/sys/class/gpio/gpio4/label")));
    }
}
