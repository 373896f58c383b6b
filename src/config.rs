//! Declarative (serde) construction of a [`Logger`](crate::Logger).
use crate::build::{Build, LoggerBuilder};
use crate::logger::Logger;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_mb() -> u64 {
    1 << 20
}

/// Configuration of a logger builder.
pub trait Config {
    /// Logger builder.
    type Builder: Build;

    /// Makes a logger builder associated with this configuration.
    fn try_to_builder(&self) -> Result<Self::Builder>;

    /// Builds a logger with this configuration.
    fn build_logger(&self) -> Result<Logger> {
        let builder = track!(self.try_to_builder())?;
        let logger = track!(builder.build())?;
        Ok(logger)
    }
}

/// The serializable configuration of a [`LoggerBuilder`].
///
/// Only what can round-trip through a config file is represented here —
/// the format callback, clock override, and mill error hook remain
/// builder-only and must be set after `try_to_builder` returns.
///
/// # Examples
///
/// ```
/// extern crate logmill;
/// extern crate serdeconv;
///
/// use logmill::LoggerConfig;
///
/// let toml = r#"
/// path = "/var/log/myapp/myapp.log"
/// max_segment_mb = 100
/// max_total_mb = 1000
/// "#;
/// let _config: LoggerConfig = serdeconv::from_toml_str(toml).unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Path of the active log file.
    pub path: PathBuf,

    /// Threshold (in units of `mb`) that triggers rotation. Zero disables
    /// size-triggered rotation.
    #[serde(default)]
    pub max_segment_mb: u64,

    /// Aggregate ceiling (in units of `mb`) across the active file and all
    /// backups. Zero disables the quota.
    #[serde(default)]
    pub max_total_mb: u64,

    /// Unit multiplier applied to `max_segment_mb` and `max_total_mb`.
    #[serde(default = "default_mb")]
    pub mb: u64,
}
impl Config for LoggerConfig {
    type Builder = LoggerBuilder;
    fn try_to_builder(&self) -> Result<Self::Builder> {
        let mut builder = LoggerBuilder::new(&self.path);
        builder
            .unit_mb(self.mb)
            .max_segment_size(self.max_segment_mb)
            .max_total_size(self.max_total_mb);
        Ok(builder)
    }
}
impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            path: PathBuf::from("app.log"),
            max_segment_mb: 0,
            max_total_mb: 0,
            mb: default_mb(),
        }
    }
}
