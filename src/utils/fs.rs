//! Filesystem helpers shared across modules.
//!
//! These helpers provide consistent error context (operation + path) and the
//! delimited append used by the raw subprocess diagnostic logs.

use std::io::Write;
use std::path::Path;

use crate::{Error, Result};

/// Convert an IO error into an application error with operation + path context.
pub fn io_error(op: &'static str, path: &Path, source: std::io::Error) -> Error {
    Error::io_path(op, path, source)
}

/// Ensure a directory exists, creating it (recursively) if needed.
///
/// Creating an already-existing directory is a no-op, so repeated calls for
/// the same date bucket are safe.
pub async fn ensure_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| io_error("creating directory", path, e))
}

/// Ensure a directory exists (synchronous variant).
pub fn ensure_dir_all_sync(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| io_error("creating directory", path, e))
}

/// Open a diagnostic log in append mode and write a delimiter header.
///
/// The returned file is handed to a subprocess as its stderr, so consecutive
/// sessions append to the same log separated by a visible delimiter line.
pub fn open_delimited_log(path: &Path, header: &str) -> Result<std::fs::File> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error("opening diagnostic log", path, e))?;
    writeln!(file, "\n===== {} =====", header)
        .map_err(|e| io_error("writing log delimiter", path, e))?;
    Ok(file)
}

/// Append one delimited block of raw subprocess output to a diagnostic log.
pub async fn append_delimited(path: &Path, header: &str, data: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| io_error("opening diagnostic log", path, e))?;
    file.write_all(format!("\n===== {} =====\n", header).as_bytes())
        .await
        .map_err(|e| io_error("writing log delimiter", path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| io_error("appending diagnostic log", path, e))?;
    // tokio::fs::File buffers writes and does not guarantee they complete on
    // drop; flush so the block is visible once this call returns.
    file.flush()
        .await
        .map_err(|e| io_error("flushing diagnostic log", path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_dir_all_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("aug_2026");

        ensure_dir_all(&dir).await.unwrap();
        assert!(dir.is_dir());

        // Second call for the same bucket must not error or duplicate.
        ensure_dir_all(&dir).await.unwrap();
        let buckets: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(buckets.len(), 1);
    }

    #[tokio::test]
    async fn test_append_delimited_separates_blocks() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("chan_remux.log");

        append_delimited(&log, "remux a", b"stderr a").await.unwrap();
        append_delimited(&log, "remux b", b"stderr b").await.unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("===== remux a ====="));
        assert!(contents.contains("stderr a"));
        assert!(contents.contains("===== remux b ====="));
        assert!(contents.contains("stderr b"));
    }

    #[test]
    fn test_open_delimited_log_appends() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("chan_capture.log");

        open_delimited_log(&log, "capture session 1").unwrap();
        open_delimited_log(&log, "capture session 2").unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("===== capture session 1 ====="));
        assert!(contents.contains("===== capture session 2 ====="));
    }

    #[test]
    fn test_io_error_carries_path_context() {
        let err = io_error(
            "creating directory",
            Path::new("/nonexistent/dir"),
            std::io::Error::other("denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("creating directory"));
        assert!(msg.contains("/nonexistent/dir"));
    }
}
