use crate::error::CacheError;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default cap on an encoded record. The remote listing (hundreds of thousands of names) is
/// the biggest payload; a file past the cap is treated as damage and discarded.
pub const MAX_RECORD_BYTES: usize = 256 * 1024 * 1024;

/// Substring present in every staging file name created by [`atomic_write`].
pub(crate) const TMP_MARKER: &str = ".tmp.";

/// Wall-clock milliseconds since the Unix epoch; `0` if the clock is set before 1970.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Bytes of the regular file at `path`, or `None`.
///
/// Symlinks, directories and files over `max_bytes` count as damage: they are deleted so the
/// slot can be rewritten.
pub(crate) fn read_file_limited(path: &Path, max_bytes: usize) -> Option<Vec<u8>> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            log_read_error(path, &err);
            return None;
        }
    };
    if !meta.file_type().is_file() {
        remove_file_best_effort(path, "not_a_regular_file");
        return None;
    }
    if meta.len() > max_bytes as u64 {
        remove_file_best_effort(path, "oversize");
        return None;
    }

    // The file may grow between `stat` and `read`; the `take` keeps the cap honest.
    let mut bytes = Vec::with_capacity(meta.len() as usize);
    let read = File::open(path)
        .and_then(|file| file.take(max_bytes as u64 + 1).read_to_end(&mut bytes));
    match read {
        Ok(len) if len > max_bytes => {
            remove_file_best_effort(path, "oversize");
            None
        }
        Ok(_) => Some(bytes),
        Err(err) => {
            log_read_error(path, &err);
            None
        }
    }
}

fn log_read_error(path: &Path, err: &io::Error) {
    if err.kind() != io::ErrorKind::NotFound {
        tracing::debug!(
            target: "pyref.cache",
            path = %path.display(),
            error = %err,
            "cache file unreadable"
        );
    }
}

/// Delete `path`, logging (not returning) failures. A missing file counts as removed.
pub(crate) fn remove_file_best_effort(path: &Path, reason: &'static str) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => {
            tracing::debug!(
                target: "pyref.cache",
                path = %path.display(),
                reason,
                error = %err,
                "could not remove cache file"
            );
            false
        }
    }
}

/// Replace `path` with `bytes`. Readers see either the previous file or the complete new
/// one: the bytes are staged in a sibling file, fsynced, then renamed into place.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let (parent, file_name) = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => (parent, name),
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a file path: {}", path.display()),
            )
            .into())
        }
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    fs::create_dir_all(parent)?;

    // A dropped `NamedTempFile` deletes itself, so every early return cleans up.
    let mut staged = tempfile::Builder::new()
        .prefix(&format!(".{}{TMP_MARKER}", file_name.to_string_lossy()))
        .tempfile_in(parent)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| err.error)?;

    #[cfg(unix)]
    if let Err(err) = File::open(parent).and_then(|dir| dir.sync_all()) {
        tracing::trace!(
            target: "pyref.cache",
            dir = %parent.display(),
            error = %err,
            "directory fsync skipped"
        );
    }
    Ok(())
}
