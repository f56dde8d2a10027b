use std::time::Duration;

use image::RgbImage;

/// Seekable access to the frames of one video.
pub trait VideoSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn frame_count(&self) -> u64;

    fn fps(&self) -> f64;

    /// The frame on screen at `at`, `None` if `at` is past the end of the video.
    fn frame_at(&mut self, at: Duration) -> Result<Option<RgbImage>, Self::Error>;

    /// `frame_count / fps`, or zero if either of them is degenerate.
    fn duration(&self) -> Duration {
        duration_of(self.frame_count(), self.fps())
    }
}

pub fn duration_of(frame_count: u64, fps: f64) -> Duration {
    if frame_count == 0 || !(fps.is_finite() && fps > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(frame_count as f64 / fps).unwrap_or(Duration::ZERO)
}
