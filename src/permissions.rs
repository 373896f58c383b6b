//! Cross platform function to apply the crate's fixed file-creation mode.
//!
//! Segments (active and backup) are created with permission `0644` —
//! owner read/write, group/other read-only. Unlike the restrictive
//! `0600` umask some loggers apply, this mode is world-readable by
//! design, so on Windows (whose default ACLs already permit that) there
//! is nothing to tighten and the function is a no-op.
use std::fs::File;
use std::io;
#[cfg(windows)]
use std::path::Path;

/// The mode newly created segment files get on Unix.
#[cfg(unix)]
const CREATE_MODE: u32 = 0o644;

#[cfg(unix)]
pub fn set_create_permissions(file: File) -> io::Result<File> {
    use std::os::unix::fs::PermissionsExt;
    let mut perm = file.metadata()?.permissions();
    perm.set_mode(CREATE_MODE);
    file.set_permissions(perm)?;
    Ok(file)
}

#[cfg(windows)]
pub fn set_create_permissions<P: AsRef<Path>>(_path: P, file: File) -> io::Result<File> {
    Ok(file)
}

#[cfg(not(any(unix, windows)))]
pub fn set_create_permissions(file: File) -> io::Result<File> {
    Ok(file)
}
