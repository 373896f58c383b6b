//! A size-bounded, rotating, gzip-compressing log file sink.
//!
//! [`Logger`] is the byte-sink itself: lazy-opens its active file, rotates
//! it aside once a size threshold is crossed, and hands compression and
//! quota enforcement off to a background "mill" thread so the synchronous
//! write path never blocks on either. Construct one through [`LoggerBuilder`]
//! (programmatically) or [`LoggerConfig`] (from a deserialized config file).
//!
//! # Examples
//!
//! ```no_run
//! use logmill::Build;
//!
//! # fn main() -> logmill::Result<()> {
//! let logger = logmill::LoggerBuilder::new("/var/log/myapp/myapp.log")
//!     .max_segment_size(100) // MB, before the `unit_mb` multiplier
//!     .max_total_size(1_000)
//!     .build()?;
//! logger.write(b"hello\n")?;
//! logger.close()?;
//! # Ok(())
//! # }
//! ```
#[macro_use]
extern crate trackable;

pub use build::{Build, LoggerBuilder};
pub use clock::{system_clock, ClockFn};
pub use config::{Config, LoggerConfig};
pub use error::{Error, ErrorKind};
pub use logger::{FormatFn, Logger};
pub use mill::ErrorHook;

pub mod build;
pub mod clock;
pub mod config;
pub mod logger;
pub mod mill;
pub mod name;
pub mod segment;

mod error;
mod permissions;

/// This crate's result type.
pub type Result<T> = std::result::Result<T, Error>;
