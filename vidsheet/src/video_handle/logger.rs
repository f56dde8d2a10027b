use std::{
    fmt::Arguments,
    path::{Path, PathBuf},
};

/// One captured log line, waiting to be handed to a [`Logger`].
pub struct Item {
    pub level: Level,
    pub target: String,
    pub body: String,
}

/// Where a [`VideoHandle`](super::VideoHandle) sends its diagnostics, including the ones
/// ffmpeg produced on its behalf.
pub trait Logger {
    fn log(&self, level: Level, target: &str, body: Arguments<'_>);
    fn log_item(&self, item: Item) {
        self.log(item.level, &item.target, format_args!("{}", item.body))
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Level {
    Verbose,
    Info,
    Warn,
    Error,
}

impl From<Level> for log::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Verbose => log::Level::Debug,
            Level::Info => log::Level::Info,
            Level::Warn => log::Level::Warn,
            Level::Error => log::Level::Error,
        }
    }
}

/// Forwards everything to the `log` crate.
pub struct LogLogger;

impl Logger for LogLogger {
    fn log(&self, level: Level, target: &str, body: Arguments<'_>) {
        log::log!(target: target, level.into(), "{}", body);
    }
}

/// Like [`LogLogger`], but tags every line with the video it is about, since many
/// handles can be open on different threads at the same time.
pub struct ContextLogger {
    video: PathBuf,
}

impl Logger for ContextLogger {
    fn log(&self, level: Level, target: &str, body: Arguments<'_>) {
        LogLogger.log(
            level,
            target,
            format_args!("{} ({})", body, self.video.display()),
        )
    }
}

impl ContextLogger {
    pub fn new(video: impl AsRef<Path>) -> Self {
        Self {
            video: video.as_ref().to_path_buf(),
        }
    }
}

#[allow(unused_macros)]
macro_rules! information {
    ($logger:expr, $($args:tt),* $(,)*) => {
        $logger.log(
            $crate::video_handle::logger::Level::Info,
            std::module_path!(),
            std::format_args!($($args),*)
        )
    }
}

#[allow(unused_macros)]
macro_rules! warning {
    ($logger:expr, $($args:tt),* $(,)*) => {
        $logger.log(
            $crate::video_handle::logger::Level::Warn,
            std::module_path!(),
            std::format_args!($($args),*)
        )
    }
}

#[allow(unused_macros)]
macro_rules! fault {
    ($logger:expr, $($args:tt),* $(,)*) => {
        $logger.log(
            $crate::video_handle::logger::Level::Error,
            std::module_path!(),
            std::format_args!($($args),*)
        )
    }
}

#[allow(unused_macros)]
macro_rules! verbose {
    ($logger:expr, $($args:tt),* $(,)*) => {
        $logger.log(
            $crate::video_handle::logger::Level::Verbose,
            std::module_path!(),
            std::format_args!($($args),*)
        )
    }
}

#[allow(unused_imports)]
pub(crate) use fault;
#[allow(unused_imports)]
pub(crate) use information;
#[allow(unused_imports)]
pub(crate) use verbose;
#[allow(unused_imports)]
pub(crate) use warning;
