//! Engine configuration
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional TOML file, and `SYSGPIO_*` environment variables.
//!
//! ```toml
//! frame = 1
//! frequency = 100
//! default_revision = 3
//! root = "/sys/class/gpio"
//! cpuinfo = "/proc/cpuinfo"
//! tolerate_exported = true
//! sample_duration = 500
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sysgpio_core::board::{Revision, CPUINFO_PATH, DEFAULT_REVISION};
use sysgpio_core::{GpioError, Result};

/// Sampling frame override (ms)
pub const ENV_FRAME: &str = "SYSGPIO_FRAME";
/// Default PWM frequency (Hz)
pub const ENV_FREQUENCY: &str = "SYSGPIO_FREQUENCY";
/// Fallback board revision
pub const ENV_REVISION: &str = "SYSGPIO_REVISION";
/// GPIO root override
pub const ENV_ROOT: &str = "SYSGPIO_ROOT";
/// Board identification file
pub const ENV_CPUINFO: &str = "SYSGPIO_CPUINFO";
/// Export policy switch
pub const ENV_TOLERATE_EXPORTED: &str = "SYSGPIO_TOLERATE_EXPORTED";

/// Engine configuration, read once and passed to the engine constructor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Sampling interval of analog reads, in milliseconds
    pub frame: u64,
    /// PWM frequency used when none is given, in Hz
    pub frequency: u32,
    /// Revision used when the board cannot be identified
    pub default_revision: Revision,
    /// GPIO root; detected from the running system when unset
    pub root: Option<PathBuf>,
    /// Board identification file
    pub cpuinfo: PathBuf,
    /// Treat exporting an already exported pin as success
    pub tolerate_exported: bool,
    /// Sampling window of analog reads when none is given, in milliseconds
    pub sample_duration: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame: 1,
            frequency: 100,
            default_revision: DEFAULT_REVISION,
            root: None,
            cpuinfo: PathBuf::from(CPUINFO_PATH),
            tolerate_exported: true,
            sample_duration: 500,
        }
    }
}

impl Config {
    /// Parse a TOML configuration; missing keys keep their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| GpioError::Config(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            GpioError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Load an optional file, then apply the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env()
    }

    /// Apply overrides from the process environment
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(std::env::vars())
    }

    /// Apply overrides from `(name, value)` pairs; unrelated names are ignored
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in vars {
            let (name, value) = (name.as_ref(), value.as_ref().trim());
            match name {
                ENV_FRAME => self.frame = parse_var(name, value)?,
                ENV_FREQUENCY => self.frequency = parse_var(name, value)?,
                ENV_REVISION => self.default_revision = parse_var(name, value)?,
                ENV_ROOT => self.root = Some(PathBuf::from(value)),
                ENV_CPUINFO => self.cpuinfo = PathBuf::from(value),
                ENV_TOLERATE_EXPORTED => self.tolerate_exported = parse_bool(name, value)?,
                _ => continue,
            }
            log::debug!("config: {}={}", name, value);
        }
        self.validate()?;
        Ok(self)
    }

    /// Check that intervals and frequencies are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.frame == 0 {
            return Err(GpioError::Config("frame must be at least 1 ms".into()));
        }
        if self.frequency == 0 {
            return Err(GpioError::Config("frequency must be at least 1 Hz".into()));
        }
        if self.sample_duration == 0 {
            return Err(GpioError::Config(
                "sample_duration must be at least 1 ms".into(),
            ));
        }
        Ok(())
    }

    /// Sampling interval of analog reads
    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame)
    }

    /// Default sampling window of analog reads
    pub fn sample_window(&self) -> Duration {
        Duration::from_millis(self.sample_duration)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| GpioError::Config(format!("invalid value for {}: {:?}", name, value)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GpioError::Config(format!(
            "invalid value for {}: {:?}",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.frame, 1);
        assert_eq!(config.frequency, 100);
        assert_eq!(config.default_revision, 3);
        assert_eq!(config.cpuinfo, PathBuf::from("/proc/cpuinfo"));
        assert!(config.root.is_none());
        assert!(config.tolerate_exported);
        assert_eq!(config.sample_window(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
frame = 2
frequency = 50
root = "/tmp/gpio"
tolerate_exported = false
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.frame, 2);
        assert_eq!(config.frequency, 50);
        assert_eq!(config.root, Some(PathBuf::from("/tmp/gpio")));
        assert!(!config.tolerate_exported);
        assert_eq!(config.default_revision, DEFAULT_REVISION);
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        assert!(matches!(
            Config::from_toml_str("speed = 3"),
            Err(GpioError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default()
            .with_vars([
                (ENV_FRAME, "3"),
                (ENV_FREQUENCY, "120"),
                (ENV_REVISION, "1"),
                (ENV_ROOT, "/sys/devices/virtual/gpio"),
                (ENV_TOLERATE_EXPORTED, "no"),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.frame, 3);
        assert_eq!(config.frequency, 120);
        assert_eq!(config.default_revision, 1);
        assert_eq!(config.root, Some(PathBuf::from("/sys/devices/virtual/gpio")));
        assert!(!config.tolerate_exported);
    }

    #[test]
    fn test_env_rejects_garbage() {
        assert!(Config::default()
            .with_vars([(ENV_FREQUENCY, "fast")])
            .is_err());
        assert!(Config::default().with_vars([(ENV_FRAME, "0")]).is_err());
        assert!(Config::default()
            .with_vars([(ENV_TOLERATE_EXPORTED, "maybe")])
            .is_err());
    }
}
