//! Picks frames at random points in a video and stamps them with where they came from.

use std::path::Path;
use std::time::Duration;

use image::imageops::{self, FilterType};
use image::RgbImage;
use rand::Rng;

use crate::config::{Sampling, SheetConfig};
use crate::label::{self, LabelError};
use crate::source::VideoSource;
use crate::video_handle::{ContextLogger, Timestamp, VideoError, VideoHandle};

/// A sampled frame, scaled and labeled, together with the time it was sampled at.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedFrame {
    pub image: RgbImage,
    pub timestamp: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum SampleError {
    #[error("failed to open the video")]
    Open(#[from] VideoError),
}

/// Why one timestamp didn't contribute a frame. Never fatal, the sampler logs it and
/// moves on.
#[derive(thiserror::Error, Debug)]
pub enum SampleDecodeError {
    #[error("failed to read a frame at {at}")]
    Read {
        at: Timestamp,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("there is no frame at {at}")]
    NoFrame { at: Timestamp },
    #[error("the frame at {at} is empty")]
    Empty { at: Timestamp },
}

/// Opens `video` and samples it. The video is closed again before this returns, however
/// it returns.
pub fn sample(
    video: impl AsRef<Path>,
    config: &SheetConfig,
) -> Result<Vec<AnnotatedFrame>, SampleError> {
    let video = video.as_ref();
    let mut handle = VideoHandle::open_with_logger(video, ContextLogger::new(video))?;
    log::debug!("Opened {}: {:?}", video.display(), handle);
    Ok(sample_source(&mut handle, config, &mut rand::thread_rng()))
}

/// Draws `config.capacity()` timestamps and tries to get a frame at each of them. The
/// frames come back in the order the timestamps were drawn in; timestamps without a
/// usable frame are skipped, so there might be fewer of them, or none at all.
pub fn sample_source<S, R>(
    source: &mut S,
    config: &SheetConfig,
    rng: &mut R,
) -> Vec<AnnotatedFrame>
where
    S: VideoSource,
    R: Rng + ?Sized,
{
    let duration = source.duration();
    log::debug!(
        "Sampling {} frames from {} of video",
        config.capacity(),
        humantime::Duration::from(duration)
    );

    let timestamps = draw_timestamps(duration, config.capacity(), config.sampling, rng);
    let mut frames = Vec::with_capacity(timestamps.len());
    for at in timestamps {
        match sample_one(source, at, config.frame_height) {
            Ok(frame) => {
                log::debug!("Got a frame at {}", Timestamp::from_duration(at));
                frames.push(frame);
            }
            Err(e) => log::warn!("Skipping a sample: {e}"),
        }
    }
    frames
}

fn sample_one<S: VideoSource>(
    source: &mut S,
    at: Duration,
    frame_height: u32,
) -> Result<AnnotatedFrame, SampleDecodeError> {
    let ts = || Timestamp::from_duration(at);
    let image = source
        .frame_at(at)
        .map_err(|e| SampleDecodeError::Read {
            at: ts(),
            source: Box::new(e),
        })?
        .ok_or_else(|| SampleDecodeError::NoFrame { at: ts() })?;
    if image.width() == 0 || image.height() == 0 {
        return Err(SampleDecodeError::Empty { at: ts() });
    }

    let image = labeled(fit_height(image, frame_height), at, label::draw_label);
    Ok(AnnotatedFrame {
        image,
        timestamp: at,
    })
}

/// Draws the time label with `draw`. A frame whose label can't be drawn is kept as is.
fn labeled(
    mut image: RgbImage,
    at: Duration,
    draw: impl FnOnce(&mut RgbImage, &str) -> Result<(), LabelError>,
) -> RgbImage {
    if let Err(e) = draw(&mut image, &label::elapsed_label(at)) {
        log::warn!(
            "Keeping the frame at {} without a label: {e}",
            Timestamp::from_duration(at)
        );
    }
    image
}

/// `count` timestamps within `0..=duration`, whole milliseconds. A zero duration makes
/// every one of them zero.
pub fn draw_timestamps<R: Rng + ?Sized>(
    duration: Duration,
    count: usize,
    sampling: Sampling,
    rng: &mut R,
) -> Vec<Duration> {
    let total = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    (0..count)
        .map(|i| {
            let (low, high) = match sampling {
                Sampling::Random => (0, total),
                Sampling::Stratified => stratum(total, i, count),
            };
            Duration::from_millis(rng.gen_range(low..=high))
        })
        .collect()
}

/// The `i`th of `count` equally long slices of `0..=total`, endpoints included.
fn stratum(total: u64, i: usize, count: usize) -> (u64, u64) {
    let at = |i: usize| (u128::from(total) * i as u128 / count as u128) as u64;
    (at(i), at(i + 1))
}

/// Scales `image` to `height`, keeping the aspect ratio. The width never becomes zero.
pub fn fit_height(image: RgbImage, height: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    if h == height {
        return image;
    }
    let width = (u64::from(w) * u64::from(height) / u64::from(h)).max(1);
    let width = u32::try_from(width).unwrap_or(u32::MAX);
    imageops::resize(&image, width, height, FilterType::Triangle)
}
