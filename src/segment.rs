//! Lists the backups belonging to a logger's active path.
use crate::name::NameCodec;
use crate::{ErrorKind, Result};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use trackable::error::ErrorKindExt;

/// A single backup file on disk: either a fresh rename from rotation or a
/// gzip-compressed replacement produced by the mill.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Filename (not full path) within the log directory.
    pub file_name: String,
    pub timestamp: DateTime<Utc>,
    pub size: u64,
    pub compressed: bool,
}
impl Segment {
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file_name)
    }
}

/// Lists every backup of `path` in its containing directory, newest first.
///
/// Ties (same timestamp) put the compressed segment before the
/// uncompressed one. Entries whose name the codec rejects are silently
/// skipped; the active file itself never appears in the result. Fails only
/// if the directory cannot be enumerated at all.
pub fn old_segments(path: &Path, codec: &NameCodec) -> Result<Vec<Segment>> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let active_name = path.file_name().and_then(|s| s.to_str());

    let entries = fs::read_dir(dir)
        .map_err(|e| ErrorKind::Io.cause(e))?;

    let mut segments = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let file_name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(_) => continue,
        };
        if Some(file_name.as_str()) == active_name {
            continue;
        }
        let (timestamp, compressed) = match codec.decode(&file_name) {
            Ok(decoded) => decoded,
            Err(_) => continue,
        };
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(_) => continue,
        };
        segments.push(Segment {
            file_name,
            timestamp,
            size,
            compressed,
        });
    }

    segments.sort_by_key(|s| (Reverse(s.timestamp), Reverse(s.compressed)));
    Ok(segments)
}
