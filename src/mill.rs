//! The background worker that compresses backups and enforces the
//! aggregate-size quota.
use crate::name::NameCodec;
use crate::permissions;
use crate::segment::{old_segments, Segment};
use crate::ErrorKind;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use trackable::error::ErrorKindExt;

/// Diagnostic callback for errors the mill cannot surface synchronously.
///
/// There is no caller blocked on the mill's work, so failures here are
/// reported through this optional hook rather than returned anywhere.
pub type ErrorHook = Arc<dyn Fn(crate::Error) + Send + Sync>;

/// Wakeup channel capacity. Two is enough to collapse a burst of
/// back-to-back rotations into a single pending wakeup without ever
/// blocking the writer that enqueues it.
const WAKEUP_CAPACITY: usize = 2;

/// Starts the mill thread and returns the wakeup sender paired with its
/// join handle.
///
/// The mill owns nothing the writer touches: it rediscovers the backup set
/// from the directory on every wakeup and reads the active file's size
/// with a plain `stat`, never by locking the writer's mutex.
pub fn spawn(
    path: PathBuf,
    codec: NameCodec,
    max_total_bytes: u64,
    error_hook: Option<ErrorHook>,
) -> (SyncSender<()>, JoinHandle<()>) {
    let (tx, rx) = sync_channel(WAKEUP_CAPACITY);
    let handle = thread::spawn(move || run(path, codec, max_total_bytes, rx, error_hook));
    (tx, handle)
}

fn run(
    path: PathBuf,
    codec: NameCodec,
    max_total_bytes: u64,
    rx: Receiver<()>,
    error_hook: Option<ErrorHook>,
) {
    // Each `Ok(())` is one collapsed wakeup; `recv` returning `Err` means
    // the sender was dropped (Logger::close) with nothing left pending, so
    // the current pass (if any) has already finished and it's time to
    // exit.
    while rx.recv().is_ok() {
        run_pass(&path, &codec, max_total_bytes, error_hook.as_ref());
    }
}

fn report(hook: Option<&ErrorHook>, kind: ErrorKind, context: &str, cause: io::Error) {
    log::warn!("logmill: {}: {}", context, cause);
    if let Some(hook) = hook {
        hook(kind.cause(cause));
    }
}

fn run_pass(path: &Path, codec: &NameCodec, max_total_bytes: u64, hook: Option<&ErrorHook>) {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    compress_pass(path, dir, codec, hook);
    quota_pass(path, dir, codec, max_total_bytes, hook);
}

/// Compresses every uncompressed backup found by the current directory
/// scan. A failure on one file is reported and the pass continues with
/// the rest — compression of the whole backup set is never aborted by a
/// single bad file.
fn compress_pass(path: &Path, dir: &Path, codec: &NameCodec, hook: Option<&ErrorHook>) {
    let segments = match old_segments(path, codec) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("logmill: failed to scan {:?}: {}", dir, e);
            return;
        }
    };
    for segment in segments.iter().filter(|s| !s.compressed) {
        if let Err(e) = compress_one(dir, segment) {
            report(hook, ErrorKind::CompressFailed, "compress", e);
        }
    }
}

fn compress_one(dir: &Path, segment: &Segment) -> io::Result<()> {
    let input_path = segment.path_in(dir);
    let final_path = dir.join(format!("{}.gz", segment.file_name));
    let temp_path = dir.join(format!("{}.gz.tmp", segment.file_name));

    gzip_file(&input_path, &temp_path, dir)?;
    if final_path.exists() {
        // A stale `.gz` sibling can be left behind by a prior crash
        // between compression and cleanup; the fresh compression wins.
        fs::remove_file(&final_path)?;
    }
    fs::rename(&temp_path, &final_path)?;
    fs::remove_file(&input_path)?;
    Ok(())
}

#[cfg(feature = "libflate")]
fn gzip_file(input_path: &Path, temp_path: &Path, dir: &Path) -> io::Result<()> {
    use libflate::gzip::Encoder;
    let mut input = File::open(input_path)?;
    let temp = File::create(temp_path)?;
    let temp = permissions_set(dir, temp)?;
    let mut encoder = Encoder::new(temp)?;
    io::copy(&mut input, &mut encoder)?;
    encoder.finish().into_result()?;
    Ok(())
}

#[cfg(not(feature = "libflate"))]
fn gzip_file(_input_path: &Path, _temp_path: &Path, _dir: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "gzip compression requires the `libflate` feature",
    ))
}

#[cfg(unix)]
fn permissions_set(_dir: &Path, file: File) -> io::Result<File> {
    permissions::set_create_permissions(file)
}

#[cfg(windows)]
fn permissions_set(dir: &Path, file: File) -> io::Result<File> {
    let _ = dir;
    permissions::set_create_permissions(dir, file)
}

#[cfg(not(any(unix, windows)))]
fn permissions_set(_dir: &Path, file: File) -> io::Result<File> {
    permissions::set_create_permissions(file)
}

/// Re-scans (so freshly compressed sizes are seen) and deletes the oldest
/// backups until the aggregate footprint is within `max_total_bytes`, or
/// only the newest backup remains — the active file is never touched.
fn quota_pass(path: &Path, dir: &Path, codec: &NameCodec, max_total_bytes: u64, hook: Option<&ErrorHook>) {
    if max_total_bytes == 0 {
        return;
    }
    let active_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let mut segments = match old_segments(path, codec) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("logmill: failed to rescan {:?} for quota: {}", dir, e);
            return;
        }
    };
    let mut total = active_size + segments.iter().map(|s| s.size).sum::<u64>();
    if total <= max_total_bytes {
        return;
    }
    // `old_segments` sorts newest-first; the oldest is always the tail.
    while total > max_total_bytes && segments.len() > 1 {
        let oldest = segments.pop().expect("len > 1 checked above");
        let victim = oldest.path_in(dir);
        match fs::remove_file(&victim) {
            Ok(()) => total -= oldest.size,
            Err(e) => {
                report(hook, ErrorKind::QuotaUnmet, "prune", e);
                break;
            }
        }
    }
}
