//! Encodes and decodes backup segment filenames.
//!
//! A backup name is `<prefix><unix_seconds><ext>`, optionally followed by
//! `.gz` once the mill has compressed it. `prefix` and `ext` are derived
//! once, from the active file's path, and reused for every encode/decode.
use crate::{ErrorKind, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;
use trackable::error::ErrorKindExt;

const GZ_SUFFIX: &str = ".gz";

/// Splits a `path` into the `prefix`/`ext` pair used to name its backups,
/// and decodes candidate backup filenames back into timestamps.
#[derive(Debug, Clone)]
pub struct NameCodec {
    prefix: String,
    ext: String,
}
impl NameCodec {
    /// Derives the codec for the active file at `path`.
    ///
    /// `prefix` is `<basename without extension> + "-"`; `ext` is the
    /// extension including its leading dot, or empty if `path` has none.
    pub fn new(path: &Path) -> Self {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let (stem, ext) = match file_name.rfind('.') {
            // A leading dot (dotfile) is not an extension separator.
            Some(i) if i > 0 => (&file_name[..i], &file_name[i..]),
            _ => (file_name, ""),
        };
        NameCodec {
            prefix: format!("{}-", stem),
            ext: ext.to_string(),
        }
    }

    /// The on-disk filename (not full path) for an uncompressed backup
    /// taken at `ts`, truncated to one-second resolution.
    pub fn backup_file_name(&self, ts: DateTime<Utc>) -> String {
        format!("{}{}{}", self.prefix, ts.timestamp(), self.ext)
    }

    /// The on-disk filename for the compressed form of the backup taken at
    /// `ts`.
    pub fn compressed_file_name(&self, ts: DateTime<Utc>) -> String {
        format!("{}{}", self.backup_file_name(ts), GZ_SUFFIX)
    }

    /// Decodes `file_name`, returning its timestamp and whether it names a
    /// compressed backup.
    ///
    /// Fails with `ErrorKind::NotASegment` if `file_name` does not start
    /// with this codec's `prefix` or does not end with `ext` (optionally
    /// followed by `.gz`). This error never escapes the crate's public
    /// API — callers (the directory scanner) simply skip the entry.
    pub fn decode(&self, file_name: &str) -> Result<(DateTime<Utc>, bool)> {
        let (body, compressed) = match file_name.strip_suffix(GZ_SUFFIX) {
            Some(stripped) => (stripped, true),
            None => (file_name, false),
        };
        let middle = body
            .strip_prefix(self.prefix.as_str())
            .and_then(|s| s.strip_suffix(self.ext.as_str()))
            .ok_or_else(|| ErrorKind::NotASegment.error())?;
        if middle.is_empty() || !middle.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ErrorKind::NotASegment.error());
        }
        let secs: i64 = middle
            .parse()
            .map_err(|_| ErrorKind::NotASegment.error())?;
        let ts = Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| ErrorKind::NotASegment.error())?;
        Ok((ts, compressed))
    }
}
