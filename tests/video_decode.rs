//! Decoder-failure tests for the looping media source.
//!
//! These substitute a stub `ffmpeg` on PATH so the acquisition contract
//! can be exercised without real media or a real decoder: an input the
//! decoder cannot read must fail `init` with a typed error instead of
//! producing an endless run of empty ticks.
//!
//! Unix-only: the stubs are shell scripts.

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use asciiview::source::{
    FrameSource, LifecycleState, LoopingVideoSource, SourceConfig, SourceError,
};

/// PATH is process-global; tests that rewrite it must not interleave.
static PATH_LOCK: Mutex<()> = Mutex::new(());

/// Install a stub `ffmpeg` script in `dir` and prepend it to PATH.
fn install_decoder_stub(dir: &Path, script_body: &str) {
    let script = dir.join("ffmpeg");
    std::fs::write(&script, script_body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let old_path = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{}", dir.display(), old_path));
}

fn media_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"not a real media container").unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_init_fails_when_decoder_exits_without_output() {
    let _path_guard = PATH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let stub_dir = tempfile::tempdir().unwrap();
    // Decoder that dies instantly, as ffmpeg does on corrupt input
    install_decoder_stub(stub_dir.path(), "#!/bin/sh\nexit 1\n");

    let media = media_file();
    let mut source = LoopingVideoSource::new();
    let result = source.init(SourceConfig::with_locator(
        4,
        4,
        media.path().to_string_lossy(),
    ));

    match result {
        Err(SourceError::ResourceAcquisitionFailed(msg)) => {
            assert!(
                msg.contains("no frames"),
                "error should name the missing output, got: {}",
                msg
            );
        }
        other => panic!(
            "init must fail when the decoder produces nothing, got {:?}",
            other
        ),
    }
    assert_eq!(source.state(), LifecycleState::Uninitialized);

    // The failure is retryable: a working decoder on the next init
    // must be accepted (same source instance, fresh acquisition).
    install_decoder_stub(stub_dir.path(), "#!/bin/sh\nexec cat /dev/zero\n");
    source
        .init(SourceConfig::with_locator(
            4,
            4,
            media.path().to_string_lossy(),
        ))
        .expect("re-init with a producing decoder should succeed");
    source.stop();
}

#[test]
fn test_first_frame_reaches_listeners_after_start() {
    let _path_guard = PATH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let stub_dir = tempfile::tempdir().unwrap();
    // Endless zero bytes: every 4x4 RGBA frame decodes as solid black
    install_decoder_stub(stub_dir.path(), "#!/bin/sh\nexec cat /dev/zero\n");

    let media = media_file();
    let mut source = LoopingVideoSource::new();

    let frames = Arc::new(AtomicUsize::new(0));
    let frames_clone = Arc::clone(&frames);
    source.add_frame_listener(Box::new(move |frame| {
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 4);
        assert_eq!(frame.data.len(), 4 * 4 * 4);
        frames_clone.fetch_add(1, Ordering::SeqCst);
    }));

    source
        .init(SourceConfig::with_locator(
            4,
            4,
            media.path().to_string_lossy(),
        ))
        .expect("stub decoder should acquire");
    assert_eq!(source.state(), LifecycleState::Initialized);
    assert_eq!(
        frames.load(Ordering::SeqCst),
        0,
        "the frame read during acquisition must not leak out before start"
    );

    source.start();
    // The loop only ever fans out while the source reports Playing
    assert_eq!(source.state(), LifecycleState::Playing);

    thread::sleep(Duration::from_millis(100));
    source.stop();
    assert!(
        frames.load(Ordering::SeqCst) > 0,
        "listeners should have seen the decoded frames"
    );
    assert_eq!(source.state(), LifecycleState::Uninitialized);
}
