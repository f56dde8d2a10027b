use std::io;
use std::path::{Path, PathBuf};

use vidsheet_common::utils::fsutils;

use crate::pipeline::ContactSheet;

/// Whatever takes finished contact sheets off the pipeline's hands.
pub trait DeliverySink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// `video` is the video the sheet was made from.
    fn deliver(&self, video: &Path, sheet: &ContactSheet) -> Result<(), Self::Error>;
}

/// Writes every sheet as `<video stem>.jpg` into one directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    outdir: PathBuf,
}

impl FileSink {
    /// Creates `outdir` if needed.
    pub fn new(outdir: impl Into<PathBuf>) -> io::Result<Self> {
        let outdir = outdir.into();
        std::fs::create_dir_all(&outdir)?;
        Ok(Self { outdir })
    }

    pub fn target_for(&self, video: &Path) -> PathBuf {
        let mut name = video.file_stem().unwrap_or(video.as_os_str()).to_owned();
        name.push(".jpg");
        self.outdir.join(name)
    }
}

impl DeliverySink for FileSink {
    type Error = io::Error;

    fn deliver(&self, video: &Path, sheet: &ContactSheet) -> io::Result<()> {
        let target = self.target_for(video);
        fsutils::replace_file(&target, &sheet.bytes)?;
        log::info!(
            "Wrote {} ({}/{} frames)",
            target.display(),
            sheet.frames,
            sheet.capacity
        );
        Ok(())
    }
}
