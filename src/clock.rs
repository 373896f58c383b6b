//! Injectable wall-clock source.
//!
//! The logger names backups and judges ages from whatever this returns, so
//! tests can swap in a deterministic clock instead of sleeping on the real
//! one.
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A `now()` function. The default is the system UTC wall clock; tests
/// substitute a fake one (see `tests::fake_clock` in `logger.rs`) that
/// advances on demand.
pub type ClockFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The default clock: `chrono::Utc::now`.
pub fn system_clock() -> ClockFn {
    Arc::new(Utc::now)
}
