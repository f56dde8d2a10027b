mod common;

use std::time::Duration;

use common::{
    create_single_frame_video, create_test_video, TEST_VIDEO_FPS, TEST_VIDEO_FRAMES, TEST_VIDEO_SIZE,
};
use vidsheet::source::VideoSource;
use vidsheet::video_handle::{self, VideoError, VideoHandle};

#[test]
fn test_metadata() -> video_handle::handle::Result<()> {
    let handle = VideoHandle::open(create_test_video())?;
    assert_eq!(TEST_VIDEO_FPS, handle.fps());
    assert!(
        (TEST_VIDEO_FRAMES - 1..=TEST_VIDEO_FRAMES + 1).contains(&handle.frame_count()),
        "{handle:?}"
    );
    let duration = VideoSource::duration(&handle);
    assert!(duration >= Duration::from_millis(9960) && duration <= Duration::from_millis(10040));
    Ok(())
}

#[test]
fn test_frame_in_the_middle() -> video_handle::handle::Result<()> {
    let mut handle = VideoHandle::open(create_test_video())?;
    let img = handle.frame_at(Duration::from_secs(5))?.expect("the video is longer");
    assert_eq!(TEST_VIDEO_SIZE, img.dimensions());
    Ok(())
}

#[test]
fn test_seeking_back_and_forth() -> video_handle::handle::Result<()> {
    let mut handle = VideoHandle::open(create_test_video())?;
    for secs in [8, 1, 6, 0, 9] {
        let at = Duration::from_secs(secs);
        handle.seek(at)?;
        let (ts, _) = handle.next_frame()?.expect("the video is longer");
        assert_eq!(at, ts.to_duration());
    }
    Ok(())
}

#[test]
fn test_past_the_end() -> video_handle::handle::Result<()> {
    let mut handle = VideoHandle::open(create_test_video())?;
    assert!(handle.frame_at(Duration::from_secs(11))?.is_none());
    // still usable afterwards
    assert!(handle.frame_at(Duration::from_secs(2))?.is_some());
    Ok(())
}

#[test]
fn test_between_frames() -> video_handle::handle::Result<()> {
    let mut handle = VideoHandle::open(create_test_video())?;
    // frames start every 40 ms, the one from 2 s is still shown at 2.01 s
    let shown = handle.frame_at(Duration::from_millis(2010))?;
    let exact = handle.frame_at(Duration::from_secs(2))?;
    assert!(shown.is_some());
    assert_eq!(exact, shown);
    Ok(())
}

#[test]
fn test_inside_the_last_frame() -> video_handle::handle::Result<()> {
    let mut handle = VideoHandle::open(create_test_video())?;
    // the last frame starts at 9.96 s and lasts until the end
    assert!(handle.frame_at(Duration::from_millis(9990))?.is_some());
    assert!(handle.frame_at(VideoSource::duration(&handle))?.is_some());
    Ok(())
}

#[test]
fn test_single_frame() -> video_handle::handle::Result<()> {
    let mut handle = VideoHandle::open(create_single_frame_video())?;
    let halfway = VideoSource::duration(&handle) / 2;
    assert!(handle.frame_at(halfway)?.is_some());
    Ok(())
}

#[test]
fn test_not_a_video() {
    let path = common::cargo_tmpdir().join("vidsheet-not-a-video.mkv");
    std::fs::write(&path, b"definitely not matroska").expect("can write to the tmpdir");
    let err = VideoHandle::open(&path).unwrap_err();
    assert!(
        matches!(err, VideoError::Open(_) | VideoError::NoVideoStream),
        "{err:?}"
    );
}
