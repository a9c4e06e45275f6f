//! Shared setup for engine tests

#![allow(dead_code)]

use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sysgpio::{Config, Filesystem, Gpio};
use sysgpio_dummy::DummySysfs;

pub const ROOT: &str = "/sys/class/gpio";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config that never looks at the host: revision 3, emulator root
pub fn config() -> Config {
    Config {
        root: Some(PathBuf::from(ROOT)),
        cpuinfo: PathBuf::from("/nonexistent/cpuinfo"),
        ..Config::default()
    }
}

pub async fn gpio() -> Gpio<DummySysfs> {
    gpio_with(config()).await
}

pub async fn gpio_with(config: Config) -> Gpio<DummySysfs> {
    init_logger();
    Gpio::new(DummySysfs::new(ROOT), config).await.unwrap()
}

pub async fn shared() -> Arc<Gpio<DummySysfs>> {
    Arc::new(gpio().await)
}

pub fn value_path(pin: u32) -> PathBuf {
    PathBuf::from(format!("{}/gpio{}/value", ROOT, pin))
}

/// Emulator whose writes each take a millisecond, so requests can interleave
#[derive(Debug, Default)]
pub struct SlowSysfs(pub DummySysfs);

impl Deref for SlowSysfs {
    type Target = DummySysfs;

    fn deref(&self) -> &DummySysfs {
        &self.0
    }
}

impl Filesystem for SlowSysfs {
    async fn read_text(&self, path: &Path) -> io::Result<String> {
        self.0.read_text(path).await
    }

    async fn write_text(&self, path: &Path, text: &str) -> io::Result<()> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.0.write_text(path, text).await
    }

    fn exists(&self, path: &Path) -> bool {
        self.0.exists(path)
    }
}

pub async fn slow_gpio() -> Arc<Gpio<SlowSysfs>> {
    init_logger();
    let fs = SlowSysfs(DummySysfs::new(ROOT));
    Arc::new(Gpio::new(fs, config()).await.unwrap())
}
