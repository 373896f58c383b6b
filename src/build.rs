//! Programmatic construction of a [`Logger`].
use crate::clock::{system_clock, ClockFn};
use crate::logger::{FormatFn, Logger};
use crate::mill::ErrorHook;
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Unit multiplier applied to `max_segment_size`/`max_total_size`. The
/// default is `1 << 20` (mebibytes); tests override it to `1` so size
/// limits can be expressed directly in bytes.
const DEFAULT_MB: u64 = 1 << 20;

/// This trait allows to build a [`Logger`] instance.
pub trait Build {
    /// Builds a logger.
    fn build(&self) -> Result<Logger>;
}

/// Builds a [`Logger`].
///
/// The resulting logger does not open its active file eagerly — the first
/// `write` (or an explicit `rotate`) does that lazily.
pub struct LoggerBuilder {
    path: PathBuf,
    mb: u64,
    max_segment_mb: u64,
    max_total_mb: u64,
    format_fn: Option<FormatFn>,
    clock: ClockFn,
    on_mill_error: Option<ErrorHook>,
}
impl std::fmt::Debug for LoggerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerBuilder")
            .field("path", &self.path)
            .field("mb", &self.mb)
            .field("max_segment_mb", &self.max_segment_mb)
            .field("max_total_mb", &self.max_total_mb)
            .field("format_fn", &self.format_fn.is_some())
            .field("on_mill_error", &self.on_mill_error.is_some())
            .finish()
    }
}
impl LoggerBuilder {
    /// Makes a new `LoggerBuilder` which will write to `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        LoggerBuilder {
            path: path.as_ref().to_path_buf(),
            mb: DEFAULT_MB,
            max_segment_mb: 0,
            max_total_mb: 0,
            format_fn: None,
            clock: system_clock(),
            on_mill_error: None,
        }
    }

    /// Sets the unit multiplier (`MB`) applied to `max_segment_size` and
    /// `max_total_size`. Defaults to `1 << 20`; tests typically set this to
    /// `1` to work in raw bytes.
    pub fn unit_mb(&mut self, mb: u64) -> &mut Self {
        self.mb = mb;
        self
    }

    /// Sets the threshold, in units of `unit_mb`, that triggers rotation
    /// before a write would exceed it. Zero (the default) disables
    /// size-triggered rotation.
    pub fn max_segment_size(&mut self, size: u64) -> &mut Self {
        self.max_segment_mb = size;
        self
    }

    /// Sets the aggregate ceiling, in units of `unit_mb`, across the active
    /// file and all backups. Zero (the default) disables the quota.
    pub fn max_total_size(&mut self, size: u64) -> &mut Self {
        self.max_total_mb = size;
        self
    }

    /// Sets a per-write byte transform. See [`FormatFn`].
    pub fn format_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&[u8], &mut Vec<u8>) -> usize + Send + Sync + 'static,
    {
        self.format_fn = Some(Arc::new(f));
        self
    }

    /// Overrides the clock used to name backups and judge ages. Tests
    /// substitute a fake one for deterministic timestamps.
    pub fn clock(&mut self, clock: ClockFn) -> &mut Self {
        self.clock = clock;
        self
    }

    /// Registers a diagnostic hook invoked on mill-internal failures that
    /// have no synchronous caller to report to.
    pub fn on_mill_error<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(crate::Error) + Send + Sync + 'static,
    {
        self.on_mill_error = Some(Arc::new(hook));
        self
    }
}
impl Build for LoggerBuilder {
    fn build(&self) -> Result<Logger> {
        Ok(Logger::new(
            self.path.clone(),
            self.max_segment_mb.saturating_mul(self.mb),
            self.max_total_mb.saturating_mul(self.mb),
            self.format_fn.clone(),
            self.clock.clone(),
            self.on_mill_error.clone(),
        ))
    }
}
