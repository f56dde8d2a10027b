pub mod ffmpeg_log;
pub mod handle;
pub mod logger;
pub mod timestamp;

pub use handle::VideoError;
pub use handle::VideoHandle;
pub use logger::{ContextLogger, LogLogger, Logger};
pub use timestamp::Timestamp;
