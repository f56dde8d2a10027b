use std::path::Path;

use rand::Rng;

use crate::compositor::{self, ComposeError};
use crate::config::{ConfigError, SheetConfig};
use crate::sampler::{self, AnnotatedFrame, SampleError};
use crate::source::VideoSource;
use crate::video_handle::VideoError;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("the video could not be opened")]
    Open(#[source] VideoError),
    #[error("not a single frame could be decoded")]
    NoFramesDecoded,
    #[error("failed to build the contact sheet")]
    Encode(#[source] ComposeError),
}

impl From<SampleError> for PipelineError {
    fn from(e: SampleError) -> Self {
        match e {
            SampleError::Open(e) => PipelineError::Open(e),
        }
    }
}

/// A finished contact sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSheet {
    /// The encoded JPEG
    pub bytes: Vec<u8>,
    /// How many cells got a frame
    pub frames: usize,
    /// How many cells there are
    pub capacity: usize,
}

/// Turns one video into one contact sheet. Holds no state besides its configuration, so
/// any number of threads can share one.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: SheetConfig,
}

impl Pipeline {
    pub fn new(config: SheetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Blocks until the whole video has been sampled and composed.
    pub fn run(&self, video: impl AsRef<Path>) -> Result<ContactSheet, PipelineError> {
        let frames = sampler::sample(video, &self.config)?;
        self.compose(frames)
    }

    pub fn run_source<S, R>(
        &self,
        source: &mut S,
        rng: &mut R,
    ) -> Result<ContactSheet, PipelineError>
    where
        S: VideoSource,
        R: Rng + ?Sized,
    {
        let frames = sampler::sample_source(source, &self.config, rng);
        self.compose(frames)
    }

    fn compose(&self, frames: Vec<AnnotatedFrame>) -> Result<ContactSheet, PipelineError> {
        if frames.is_empty() {
            return Err(PipelineError::NoFramesDecoded);
        }

        let bytes = compositor::compose(&frames, &self.config).map_err(|e| match e {
            ComposeError::EmptyInput => PipelineError::NoFramesDecoded,
            e => PipelineError::Encode(e),
        })?;
        Ok(ContactSheet {
            bytes,
            frames: frames.len().min(self.config.capacity()),
            capacity: self.config.capacity(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::fake::FakeSource;
    use rand::{rngs::SmallRng, SeedableRng};
    use std::time::Duration;

    fn pipeline(rows: u32, columns: u32) -> Pipeline {
        Pipeline::new(SheetConfig {
            rows,
            columns,
            frame_height: 48,
            ..SheetConfig::default()
        })
        .expect("valid config")
    }

    #[test]
    fn full_sheet() {
        let mut source = FakeSource::new(2500, 25.0);
        let sheet = pipeline(2, 2)
            .run_source(&mut source, &mut SmallRng::seed_from_u64(2))
            .expect("every frame decodes");
        assert_eq!((4, 4), (sheet.frames, sheet.capacity));

        let decoded = image::load_from_memory(&sheet.bytes).expect("a valid image");
        assert_eq!((512, 512), (decoded.width(), decoded.height()));
    }

    #[test]
    fn partial_sheet() {
        let mut source = FakeSource::new(2500, 25.0);
        source.fails = |at| at > Duration::from_secs(50);
        let sheet = pipeline(50, 1)
            .run_source(&mut source, &mut SmallRng::seed_from_u64(2))
            .expect("some frames decode");
        assert!(sheet.frames > 0 && sheet.frames < 50, "{}", sheet.frames);
    }

    #[test]
    fn no_frames() {
        let mut source = FakeSource::new(2500, 25.0);
        source.fails = |_| true;
        let err = pipeline(2, 2)
            .run_source(&mut source, &mut SmallRng::seed_from_u64(2))
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoFramesDecoded));
    }

    #[test]
    fn zero_duration() {
        let mut ok = FakeSource::new(0, 0.0);
        let sheet = pipeline(2, 2)
            .run_source(&mut ok, &mut SmallRng::seed_from_u64(2))
            .expect("the first frame decodes");
        assert_eq!(4, sheet.frames);

        let mut broken = FakeSource::new(0, 0.0);
        broken.missing = |_| true;
        let err = pipeline(2, 2)
            .run_source(&mut broken, &mut SmallRng::seed_from_u64(2))
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoFramesDecoded));
    }

    #[test]
    fn same_seed_same_sheet() {
        let run = || {
            pipeline(4, 2)
                .run_source(
                    &mut FakeSource::new(1000, 30.0),
                    &mut SmallRng::seed_from_u64(9),
                )
                .expect("every frame decodes")
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn invalid_config() {
        let config = SheetConfig {
            rows: 0,
            ..SheetConfig::default()
        };
        assert!(matches!(Pipeline::new(config), Err(ConfigError::Zero("rows"))));
    }

    #[test]
    fn missing_video() {
        let err = pipeline(2, 2).run("/nope/nothing.mkv").unwrap_err();
        assert!(matches!(err, PipelineError::Open(_)));
    }
}
