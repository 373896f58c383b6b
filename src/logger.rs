//! The public byte-sink: lazy open, pre-write rotation, optional format
//! transform, and size accounting, behind a single mutex.
use crate::clock::ClockFn;
use crate::mill::{self, ErrorHook};
use crate::name::NameCodec;
use crate::permissions;
use crate::{ErrorKind, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use trackable::error::ErrorKindExt;

/// A per-write byte transform.
///
/// Given the caller's bytes and a scratch buffer to fill with the
/// formatted output, returns the index within that output where the
/// caller's own payload begins — everything before it is framing that
/// does not count against the caller's `write` return value. `Arc`, not
/// `Box`, so a `LoggerBuilder` can hand the same callback to more than one
/// `Logger` built from it.
pub type FormatFn = Arc<dyn Fn(&[u8], &mut Vec<u8>) -> usize + Send + Sync>;

/// A size-bounded, rotating, gzip-compressing log file sink.
///
/// Cloning is not supported — a `Logger` owns one active file handle and
/// one mill thread; share it behind an `Arc` if multiple writers need it.
pub struct Logger {
    inner: Mutex<Inner>,
    wakeup: Mutex<Option<SyncSender<()>>>,
    mill: Mutex<Option<JoinHandle<()>>>,
}
impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

struct Inner {
    path: PathBuf,
    codec: NameCodec,
    clock: ClockFn,
    max_segment_bytes: u64,
    file: Option<File>,
    active_bytes: u64,
    format_fn: Option<FormatFn>,
    scratch: Vec<u8>,
}

impl Logger {
    pub(crate) fn new(
        path: PathBuf,
        max_segment_bytes: u64,
        max_total_bytes: u64,
        format_fn: Option<FormatFn>,
        clock: ClockFn,
        error_hook: Option<ErrorHook>,
    ) -> Self {
        let codec = NameCodec::new(&path);
        let (tx, handle) = mill::spawn(path.clone(), codec.clone(), max_total_bytes, error_hook);
        // Run one pass immediately: a prior process may have crashed
        // between renaming a backup aside and the mill compressing it,
        // leaving an uncompressed backup (and maybe a stale empty `.gz`
        // temp sibling) for this instance to clean up on startup, with no
        // rotation to trigger a wakeup otherwise.
        let _ = tx.try_send(());
        let inner = Inner {
            path,
            codec,
            clock,
            max_segment_bytes,
            file: None,
            active_bytes: 0,
            format_fn,
            scratch: Vec::new(),
        };
        Logger {
            inner: Mutex::new(inner),
            wakeup: Mutex::new(Some(tx)),
            mill: Mutex::new(Some(handle)),
        }
    }

    /// Writes `bytes`, rotating first if they would overflow the active
    /// segment. Returns the number of caller-payload bytes the disk
    /// accepted — always `bytes.len()` on a full, unformatted write.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.write_locked(bytes, &self.wakeup)
    }

    /// Forces an immediate rotation, lazily opening the active file first
    /// if none is open yet (so rotating a never-written-to logger still
    /// produces a backup, possibly empty).
    pub fn rotate(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.file.is_none() {
            inner.ensure_open(0, &self.wakeup)?;
        }
        inner.rotate(&self.wakeup)
    }

    /// Pushes any buffered bytes to the OS. A no-op: the active file is
    /// written to directly, unbuffered.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(f) = inner.file.as_mut() {
            f.flush().map_err(|e| ErrorKind::Io.cause(e))?;
        }
        Ok(())
    }

    /// Flushes and closes the active file, then stops the mill and waits
    /// for it to exit. Idempotent: a second call observes the latch
    /// already tripped and returns immediately without touching anything.
    pub fn close(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(f) = inner.file.as_mut() {
                f.flush().map_err(|e| ErrorKind::Io.cause(e))?;
            }
            inner.file = None;
        }
        // Dropping the sender disconnects the channel: the mill drains
        // whatever wakeup is already pending, finishes that pass, and
        // exits on its next `recv`. This Option is the one-shot latch —
        // a second `close` finds it already `None` and does nothing.
        let sender = self.wakeup.lock().unwrap().take();
        drop(sender);
        if let Some(handle) = self.mill.lock().unwrap().take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Inner {
    fn write_locked(&mut self, buf: &[u8], wakeup: &Mutex<Option<SyncSender<()>>>) -> Result<usize> {
        // `ensure_open` already makes the rotate-or-append decision for a
        // lazily-opened file using this write's length. Only a file that
        // was *already* open needs the separate pre-write check below —
        // otherwise a write that just triggered ensure_open's own rotation
        // would immediately trigger a second, spurious one.
        let was_already_open = self.file.is_some();
        self.ensure_open(buf.len() as u64, wakeup)?;

        if was_already_open
            && self.max_segment_bytes > 0
            && self.active_bytes + buf.len() as u64 > self.max_segment_bytes
        {
            self.rotate(wakeup)?;
        }

        // Take the scratch buffer out of `self` so it isn't borrowed while
        // we also need a mutable borrow of `self.file` below.
        let mut scratch = std::mem::take(&mut self.scratch);
        let (msg_idx, formatted) = if let Some(ref f) = self.format_fn {
            scratch.clear();
            let idx = f(buf, &mut scratch);
            (idx, true)
        } else {
            (0, false)
        };

        let file = self.file.as_mut().ok_or_else(|| {
            ErrorKind::Io.cause(io::Error::new(io::ErrorKind::Other, "no active file open"))
        })?;
        let written = if formatted {
            file.write(&scratch).map_err(|e| ErrorKind::Io.cause(e))?
        } else {
            file.write(buf).map_err(|e| ErrorKind::Io.cause(e))?
        };
        self.active_bytes += written as u64;
        self.scratch = scratch;

        let consumed = written.saturating_sub(msg_idx).min(buf.len());
        Ok(consumed)
    }

    /// Opens the active file if none is open: appends to an existing one
    /// that still has room for `write_len` more bytes, rotates an
    /// existing one that doesn't, or creates a fresh one if `path`
    /// doesn't exist yet.
    fn ensure_open(&mut self, write_len: u64, wakeup: &Mutex<Option<SyncSender<()>>>) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        match std::fs::metadata(&self.path) {
            Ok(meta) => {
                let cur_len = meta.len();
                if self.max_segment_bytes == 0 || cur_len + write_len <= self.max_segment_bytes {
                    let file = OpenOptions::new()
                        .append(true)
                        .open(&self.path)
                        .map_err(|e| ErrorKind::Io.cause(e))?;
                    self.active_bytes = cur_len;
                    self.file = Some(file);
                    Ok(())
                } else {
                    self.rotate(wakeup)
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.open_fresh(),
            Err(e) => Err(ErrorKind::Io.cause(e).into()),
        }
    }

    fn open_fresh(&mut self) -> Result<()> {
        let mut opts = OpenOptions::new();
        opts.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o644);
        }
        let file = opts.open(&self.path).map_err(|e| ErrorKind::Io.cause(e))?;
        let file = Self::apply_permissions(&self.path, file)?;
        self.file = Some(file);
        self.active_bytes = 0;
        Ok(())
    }

    #[cfg(unix)]
    fn apply_permissions(_path: &std::path::Path, file: File) -> Result<File> {
        permissions::set_create_permissions(file).map_err(|e| ErrorKind::Io.cause(e).into())
    }

    #[cfg(windows)]
    fn apply_permissions(path: &std::path::Path, file: File) -> Result<File> {
        permissions::set_create_permissions(path, file).map_err(|e| ErrorKind::Io.cause(e).into())
    }

    #[cfg(not(any(unix, windows)))]
    fn apply_permissions(_path: &std::path::Path, file: File) -> Result<File> {
        permissions::set_create_permissions(file).map_err(|e| ErrorKind::Io.cause(e).into())
    }

    /// Closes the active file (if open), renames it aside with a
    /// timestamp suffix (overwriting a same-second collision), opens a
    /// fresh active file, and wakes the mill. The only place the active
    /// file handle is ever replaced.
    fn rotate(&mut self, wakeup: &Mutex<Option<SyncSender<()>>>) -> Result<()> {
        self.file = None;
        if self.path.exists() {
            let ts = (self.clock)();
            let backup_name = self.codec.backup_file_name(ts);
            let backup_path = self
                .path
                .parent()
                .unwrap_or_else(|| std::path::Path::new("."))
                .join(backup_name);
            if backup_path.exists() {
                let _ = std::fs::remove_file(&backup_path);
            }
            std::fs::rename(&self.path, &backup_path)
                .map_err(|e| ErrorKind::RotateFailed.cause(e))?;
        }
        self.open_fresh()
            .map_err(|e| ErrorKind::RotateFailed.takes_over(e))?;

        if let Some(tx) = wakeup.lock().unwrap().as_ref() {
            let _ = tx.try_send(());
        }
        Ok(())
    }
}

/// Spawns a fresh fake clock for tests: starts at an arbitrary instant and
/// advances only when told to, so rotation timestamps are deterministic.
#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    pub struct FakeClock(AtomicI64);
    impl FakeClock {
        pub fn new(start_unix_secs: i64) -> Arc<Self> {
            Arc::new(FakeClock(AtomicI64::new(start_unix_secs)))
        }
        pub fn advance(&self, secs: i64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
        pub fn now(&self) -> DateTime<Utc> {
            use chrono::TimeZone;
            Utc.timestamp_opt(self.0.load(Ordering::SeqCst), 0)
                .single()
                .unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeClock;
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn clock_fn(clock: Arc<FakeClock>) -> ClockFn {
        Arc::new(move || clock.now())
    }

    /// Decodes a gzip file's full contents, for asserting on what the mill
    /// actually compressed.
    fn gunzip(path: &std::path::Path) -> Vec<u8> {
        use libflate::gzip::Decoder;
        use std::io::Read;
        let file = fs::File::open(path).unwrap();
        let mut decoder = Decoder::new(file).unwrap();
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        out
    }

    fn new_logger(path: PathBuf, max_segment_bytes: u64, max_total_bytes: u64, clock: ClockFn) -> Logger {
        Logger::new(path, max_segment_bytes, max_total_bytes, None, clock, None)
    }

    #[test]
    fn s1_first_write_creates_file_without_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.log");
        let clock = clock_fn(FakeClock::new(1_000));
        let logger = new_logger(path.clone(), 0, 0, clock);

        logger.write(b"hello").unwrap();
        logger.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"hello");
        let backups: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(backups.len(), 1, "only the active file should exist");
    }

    #[test]
    fn s2_appends_to_a_pre_existing_active_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.log");
        fs::write(&path, b"existing-").unwrap();
        let clock = clock_fn(FakeClock::new(1_000));
        let logger = new_logger(path.clone(), 0, 0, clock);

        logger.write(b"appended").unwrap();
        logger.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"existing-appended");
    }

    #[test]
    fn s3_a_write_that_would_overflow_the_threshold_rotates_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.log");
        fs::write(&path, b"1234").unwrap(); // 4 bytes already on disk
        let clock = clock_fn(FakeClock::new(1_399_214_673));
        // max_segment_bytes = 6: appending an 8-byte write to a 4-byte file
        // must rotate exactly once, not twice.
        let logger = new_logger(path.clone(), 6, 0, clock);

        logger.write(b"12345678").unwrap();
        // `close()` drains the wakeup the rotation above enqueued and joins
        // the mill, so by the time it returns the backup has already been
        // compressed and its uncompressed original removed.
        logger.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"12345678");
        let backup = dir.path().join("foo-1399214673.log");
        assert!(!backup.exists(), "uncompressed backup replaced by its .gz sibling");
        let gz_backup = dir.path().join("foo-1399214673.log.gz");
        assert_eq!(gunzip(&gz_backup), b"1234");
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 2, "exactly one rotation, not a second spurious one");
    }

    #[test]
    fn s4_quota_prunes_oldest_backups() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.log");
        // Two pre-existing compressed backups plus the active file exceed
        // `max_total_bytes`; the oldest backup alone is over budget.
        fs::write(dir.path().join("foo-1000.log.gz"), b"aaaa").unwrap();
        fs::write(dir.path().join("foo-2000.log.gz"), b"bbbb").unwrap();
        fs::write(&path, b"cccc").unwrap();
        let clock = clock_fn(FakeClock::new(3000));
        // Construction alone enqueues an initial mill wakeup; no write or
        // rotate is needed to trigger the quota pass.
        let logger = new_logger(path.clone(), 0, 10, clock);
        logger.close().unwrap();

        assert!(!dir.path().join("foo-1000.log.gz").exists(), "oldest backup pruned");
        assert!(dir.path().join("foo-2000.log.gz").exists(), "newer backup kept");
        assert_eq!(fs::read(&path).unwrap(), b"cccc", "active file untouched");
    }

    #[test]
    fn s5_compresses_a_crash_residue_backup_on_startup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.log");
        fs::write(dir.path().join("foo-500.log"), b"leftover").unwrap();
        let clock = clock_fn(FakeClock::new(600));
        let logger = new_logger(path, 0, 0, clock);

        // No write or rotate happens at all; the initial mill wakeup sent
        // from `Logger::new` alone must pick up the crash residue.
        logger.close().unwrap();

        assert!(!dir.path().join("foo-500.log").exists());
        assert_eq!(gunzip(&dir.path().join("foo-500.log.gz")), b"leftover");
    }

    #[test]
    fn close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.log");
        let clock = clock_fn(FakeClock::new(1));
        let logger = new_logger(path, 0, 0, clock);
        logger.write(b"x").unwrap();
        logger.close().unwrap();
        logger.close().unwrap();
    }

    #[test]
    fn rotate_on_a_never_written_logger_produces_an_empty_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.log");
        let clock = clock_fn(FakeClock::new(42));
        let logger = new_logger(path.clone(), 0, 0, clock);

        logger.rotate().unwrap();
        logger.close().unwrap();

        assert_eq!(fs::read(dir.path().join("foo-42.log")).unwrap(), b"");
        assert!(path.exists());
    }

    #[test]
    fn format_fn_framing_is_written_but_not_counted_against_the_caller() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.log");
        let clock = clock_fn(FakeClock::new(1));
        // Prefixes every write with a fixed "[log] " framing; only the bytes
        // after it belong to the caller's own payload.
        let format_fn: FormatFn = Arc::new(|buf, scratch| {
            scratch.extend_from_slice(b"[log] ");
            let msg_idx = scratch.len();
            scratch.extend_from_slice(buf);
            msg_idx
        });
        let logger = Logger::new(path.clone(), 0, 0, Some(format_fn), clock, None);

        let consumed = logger.write(b"hi").unwrap();
        logger.close().unwrap();

        assert_eq!(consumed, 2, "caller byte count excludes the framing prefix");
        assert_eq!(fs::read(&path).unwrap(), b"[log] hi");
    }

    #[test]
    fn on_mill_error_hook_observes_a_compress_failure() {
        use std::sync::mpsc::channel;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo.log");
        // A directory in place of a backup file makes gzip compression of
        // it fail without disturbing the rest of the pass.
        fs::create_dir(dir.path().join("foo-500.log")).unwrap();
        let clock = clock_fn(FakeClock::new(600));
        let (tx, rx) = channel();
        let hook: ErrorHook = Arc::new(move |e| {
            let _ = tx.send(e);
        });
        let logger = Logger::new(path, 0, 0, None, clock, Some(hook));
        logger.close().unwrap();

        let err = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(*err.kind(), ErrorKind::CompressFailed);
    }
}
