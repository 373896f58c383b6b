use std::io;
use trackable::error::{ErrorKind as TrackableErrorKind, ErrorKindExt};
use trackable::error::{IntoTrackableError, TrackableError};

/// The error type for this crate.
pub type Error = TrackableError<ErrorKind>;

/// A list of error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// File create/open/write/close/stat/rename/readdir failure on the
    /// synchronous write/rotate path.
    Io,

    /// The rotator's close-rename-open sequence failed partway through.
    ///
    /// The `Logger` remains usable: the next `write` retries lazy open.
    RotateFailed,

    /// The mill failed to gzip-compress a single backup.
    ///
    /// The uncompressed original is left in place; the mill continues with
    /// the next file.
    CompressFailed,

    /// The mill could not delete enough backups to satisfy
    /// `max_total_bytes` and gave up until the next wakeup.
    QuotaUnmet,

    /// Internal name-codec outcome: a directory entry's name does not
    /// belong to this logger. Never escapes the crate's public API.
    NotASegment,

    /// Anything else (invalid configuration, non-UTF-8 paths, ...).
    Invalid,
}
impl TrackableErrorKind for ErrorKind {}
impl IntoTrackableError<io::Error> for ErrorKind {
    fn into_trackable_error(e: io::Error) -> Error {
        ErrorKind::Io.cause(e)
    }
}
