use std::path::{Path, PathBuf};

/// How the sampling timestamps are spread over the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Sampling {
    /// Independent uniform draws over the whole video, duplicates allowed.
    #[default]
    Random,
    /// One uniform draw inside each of `rows * columns` equally long slices.
    Stratified,
}

/// Everything that decides what a contact sheet looks like.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub rows: u32,
    pub columns: u32,
    /// Every sampled frame is scaled to this height, keeping its aspect ratio
    pub frame_height: u32,
    /// Black space around every cell, in pixels
    pub margin: u32,
    /// The finished sheet is a square with this side
    pub output_size: u32,
    pub jpeg_quality: u8,
    pub sampling: Sampling,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            rows: 4,
            columns: 2,
            frame_height: 512,
            margin: 10,
            output_size: 512,
            jpeg_quality: 95,
            sampling: Sampling::Random,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read the config file at {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse the config")]
    Parse(#[from] ron::error::SpannedError),
    #[error("{0} must be at least one")]
    Zero(&'static str),
    #[error("the jpeg quality must be within 1..=100, got {0}")]
    Quality(u8),
}

impl SheetConfig {
    /// How many frames fit in the grid.
    pub fn capacity(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("rows", self.rows),
            ("columns", self.columns),
            ("frame_height", self.frame_height),
            ("output_size", self.output_size),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Quality(self.jpeg_quality));
        }
        Ok(())
    }

    /// Fields missing from `ron` keep their defaults.
    pub fn from_ron_str(ron: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_ron_str(&contents)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SheetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(8, config.capacity());
    }

    #[test]
    fn partial_ron() {
        let config =
            SheetConfig::from_ron_str("(rows: 2, columns: 3, sampling: Stratified)")
                .expect("valid config");
        assert_eq!(
            SheetConfig {
                rows: 2,
                columns: 3,
                sampling: Sampling::Stratified,
                ..SheetConfig::default()
            },
            config
        );
    }

    #[test]
    fn rejects_zeroes() {
        let config = SheetConfig {
            columns: 0,
            ..SheetConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero("columns"))));

        assert!(matches!(
            SheetConfig::from_ron_str("(output_size: 0)"),
            Err(ConfigError::Zero("output_size"))
        ));
    }

    #[test]
    fn rejects_bad_quality() {
        let config = SheetConfig {
            jpeg_quality: 0,
            ..SheetConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Quality(0))));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            SheetConfig::from_ron_str("(rows: \"many\")"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn reads_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sheet.ron");
        std::fs::write(&path, "(margin: 0)")?;
        assert_eq!(0, SheetConfig::from_ron_file(&path)?.margin);

        assert!(matches!(
            SheetConfig::from_ron_file(dir.path().join("missing.ron")),
            Err(ConfigError::Read { .. })
        ));
        Ok(())
    }
}
