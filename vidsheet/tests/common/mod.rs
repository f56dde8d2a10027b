// NOTE: every test will complain about the functions it doesn't use
#![allow(unused)]

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Once;

pub const TEST_VIDEO_FRAMES: u64 = 250;
pub const TEST_VIDEO_FPS: f64 = 25.0;
pub const TEST_VIDEO_SIZE: (u32, u32) = (320, 240);

/// Returns cargo's tmpdir
pub fn cargo_tmpdir() -> PathBuf {
    PathBuf::from(option_env!("CARGO_TARGET_TMPDIR").expect("no cargo tmpdir???"))
}

/// A 10 second, 25 fps, 320x240 test pattern, created once per test binary.
pub fn create_test_video() -> PathBuf {
    let tmpvideo = cargo_tmpdir().join("vidsheet-testvideo.mkv");

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::fs::remove_file(&tmpvideo).ok();
        run_ffmpeg(&tmpvideo, "testsrc=duration=10:rate=25:size=320x240");
    });

    tmpvideo
}

/// A file with a single frame in it.
pub fn create_single_frame_video() -> PathBuf {
    let tmpvideo = cargo_tmpdir().join("vidsheet-single.mkv");

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::fs::remove_file(&tmpvideo).ok();
        run_ffmpeg(&tmpvideo, "testsrc=duration=0.04:rate=25:size=320x240");
    });

    tmpvideo
}

fn run_ffmpeg(output: &Path, lavfi: &str) {
    let status = std::process::Command::new("ffmpeg")
        .args([
            "-f",
            "lavfi",
            "-i",
            lavfi,
            output.as_os_str().to_str().expect("no probs, probably"),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .status()
        .expect("failed to execute ffmpeg");
    assert!(status.success(), "ffmpeg failed to create {output:?}");
}
