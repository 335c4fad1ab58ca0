//! End-to-end watcher pipeline: an append-only manifest grows while a
//! watcher discovers, remuxes, and finalizes segments.
//!
//! The repackaging tool is stood in for by small shell scripts, so these
//! tests are unix-only.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use liveleech::remux::{final_path_for, Remuxer};
use liveleech::watcher::WatcherHandle;

/// A stand-in remux tool: copies `-i <src>` to the final positional argument.
fn fake_ffmpeg(dir: &Path) -> PathBuf {
    let path = dir.join("fake_ffmpeg.sh");
    let script = r#"#!/bin/sh
src=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "-i" ]; then src="$arg"; fi
    prev="$arg"
    dst="$arg"
done
cp "$src" "$dst"
"#;
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn failing_ffmpeg(dir: &Path) -> PathBuf {
    let path = dir.join("failing_ffmpeg.sh");
    fs::write(&path, "#!/bin/sh\nexit 1\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Like [`fake_ffmpeg`], but exits nonzero for sources matching `bad`.
fn selective_ffmpeg(dir: &Path, bad: &str) -> PathBuf {
    let path = dir.join("selective_ffmpeg.sh");
    let script = format!(
        r#"#!/bin/sh
src=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "-i" ]; then src="$arg"; fi
    prev="$arg"
    dst="$arg"
done
case "$src" in
    *{bad}*) exit 1 ;;
esac
cp "$src" "$dst"
"#
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_segment(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, name.as_bytes()).unwrap();
    path
}

fn append_manifest(manifest: &Path, entry: &Path) {
    use std::io::Write;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(manifest)
        .unwrap();
    writeln!(file, "{}", entry.display()).unwrap();
}

#[tokio::test]
async fn test_segments_are_discovered_remuxed_and_finalized() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("aug_2026");
    fs::create_dir(&out).unwrap();
    let manifest = out.join("29_Title_1787000000.segments.txt");
    let tool = fake_ffmpeg(tmp.path());

    let handle = WatcherHandle::spawn(
        &manifest,
        Remuxer::new(tool.to_string_lossy()),
        Duration::from_millis(25),
    );

    // Segments close one at a time while the watcher is running.
    let seg0 = write_segment(&out, "29_Title_1787000000_00000.frag.mp4");
    append_manifest(&manifest, &seg0);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let seg1 = write_segment(&out, "29_Title_1787000000_00001.frag.mp4");
    append_manifest(&manifest, &seg1);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let seg2 = write_segment(&out, "29_Title_1787000000_00002.frag.mp4");
    append_manifest(&manifest, &seg2);

    // The last segment may only be seen by the drain pass.
    let stats = handle.stop_and_drain(None).await.unwrap();
    assert_eq!(stats.remuxed, 3);
    assert_eq!(stats.failed, 0);

    for seg in [&seg0, &seg1, &seg2] {
        let finalized = final_path_for(seg).unwrap();
        assert!(finalized.exists(), "missing {}", finalized.display());
        assert!(!finalized.to_string_lossy().contains(".frag"));
        // Sources are retained unless removal was requested.
        assert!(seg.exists());
    }
}

#[tokio::test]
async fn test_remove_source_deletes_fragmented_file_after_success() {
    let tmp = TempDir::new().unwrap();
    let manifest = tmp.path().join("s.segments.txt");
    let tool = fake_ffmpeg(tmp.path());

    let seg = write_segment(tmp.path(), "seg_00000.frag.mp4");
    append_manifest(&manifest, &seg);

    let handle = WatcherHandle::spawn(
        &manifest,
        Remuxer::new(tool.to_string_lossy()).with_remove_source(true),
        Duration::from_secs(3600),
    );
    let stats = handle.stop_and_drain(None).await.unwrap();

    assert_eq!(stats.remuxed, 1);
    assert!(final_path_for(&seg).unwrap().exists());
    assert!(!seg.exists());
}

#[tokio::test]
async fn test_one_bad_segment_does_not_block_its_neighbors() {
    let tmp = TempDir::new().unwrap();
    let manifest = tmp.path().join("s.segments.txt");
    let tool = selective_ffmpeg(tmp.path(), "00001");

    let seg0 = write_segment(tmp.path(), "seg_00000.frag.mp4");
    let seg1 = write_segment(tmp.path(), "seg_00001.frag.mp4");
    let seg2 = write_segment(tmp.path(), "seg_00002.frag.mp4");
    for seg in [&seg0, &seg1, &seg2] {
        append_manifest(&manifest, seg);
    }

    let handle = WatcherHandle::spawn(
        &manifest,
        Remuxer::new(tool.to_string_lossy()).with_remove_source(true),
        Duration::from_secs(3600),
    );
    let stats = handle.stop_and_drain(None).await.unwrap();

    assert_eq!(stats.remuxed, 2);
    assert_eq!(stats.failed, 1);
    assert!(final_path_for(&seg0).unwrap().exists());
    assert!(final_path_for(&seg2).unwrap().exists());
    assert!(!seg0.exists() && !seg2.exists());
    // The failed one keeps its fragmented source for manual recovery.
    assert!(seg1.exists());
    assert!(!final_path_for(&seg1).unwrap().exists());
}

#[tokio::test]
async fn test_failed_remux_keeps_source_and_is_counted() {
    let tmp = TempDir::new().unwrap();
    let manifest = tmp.path().join("s.segments.txt");
    let tool = failing_ffmpeg(tmp.path());

    let seg = write_segment(tmp.path(), "seg_00000.frag.mp4");
    append_manifest(&manifest, &seg);

    let handle = WatcherHandle::spawn(
        &manifest,
        Remuxer::new(tool.to_string_lossy()).with_remove_source(true),
        Duration::from_secs(3600),
    );
    let stats = handle.stop_and_drain(None).await.unwrap();

    assert_eq!(stats.remuxed, 0);
    assert_eq!(stats.failed, 1);
    // A failed repackaging never costs the captured data.
    assert!(seg.exists());
    assert!(!final_path_for(&seg).unwrap().exists());
}
