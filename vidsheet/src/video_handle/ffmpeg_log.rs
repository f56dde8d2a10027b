//! Routes ffmpeg's own log output through a [`Logger`](super::Logger).
//!
//! ffmpeg logs from whatever thread calls into it, so the callback only buffers the lines
//! thread locally. The handle that made the call drains the buffer right after, which
//! attributes every line to the video it belongs to.

extern crate ffmpeg_next as ffmpeg;

use std::borrow::Cow;
use std::cell::RefCell;
use std::ffi::CStr;

use ffmpeg::util::log as ffmpeglog;

use super::logger::{Item, Level, Logger};

thread_local! {
    static LOGS: RefCell<Vec<Item>> = const { RefCell::new(Vec::new()) };
}

/// Makes ffmpeg report warnings and worse to [`drain_into`]. Call once per process.
pub(super) fn install() {
    ffmpeglog::set_level(ffmpeglog::Level::Warning);
    unsafe {
        ffmpeg_sys_next::av_log_set_callback(Some(ffmpeg_log_adaptor));
    }
}

/// Hands everything ffmpeg logged on this thread so far to `logger`.
pub(super) fn drain_into(logger: &impl Logger) {
    LOGS.with_borrow_mut(|vec| {
        for item in vec.drain(..) {
            logger.log_item(item);
        }
    })
}

fn map_level(level: libc::c_int) -> Level {
    match ffmpeglog::Level::try_from(level) {
        Ok(ffmpeglog::Level::Error | ffmpeglog::Level::Fatal | ffmpeglog::Level::Panic) => {
            Level::Error
        }
        Ok(ffmpeglog::Level::Warning) => Level::Warn,
        Ok(ffmpeglog::Level::Info) | Err(_) => Level::Info,
        Ok(
            ffmpeglog::Level::Verbose
            | ffmpeglog::Level::Debug
            | ffmpeglog::Level::Trace
            | ffmpeglog::Level::Quiet,
        ) => Level::Verbose,
    }
}

/// The name of whatever ffmpeg component logged, e.g. the demuxer or codec.
unsafe fn class_name(avcl: *mut libc::c_void) -> Cow<'static, str> {
    if avcl.is_null() {
        return "NULL_avcl".into();
    }

    let avc = *(avcl as *const *const ffmpeg_sys_next::AVClass);
    if avc.is_null() {
        return "NULL_avc".into();
    }

    let Some(item_name) = (*avc).item_name else {
        return "NULL_item".into();
    };

    let item = CStr::from_ptr(item_name(avcl)).to_string_lossy();
    if item == "NULL" {
        CStr::from_ptr((*avc).class_name).to_string_lossy().into_owned().into()
    } else {
        item.into_owned().into()
    }
}

extern "C" {
    fn vsnprintf(
        strbuf: *mut libc::c_char,
        size: libc::size_t,
        format: *const libc::c_char,
        va_list: *mut libc::c_void,
    ) -> libc::c_int;
}

unsafe extern "C" fn ffmpeg_log_adaptor(
    avcl: *mut libc::c_void,
    level: libc::c_int,
    fmt: *const libc::c_char,
    va_list: *mut ffmpeg_sys_next::__va_list_tag,
) {
    if level > ffmpeg_sys_next::av_log_get_level() {
        return;
    }

    const BUF_SIZE: usize = 2048;
    let mut buffer: Vec<u8> = vec![0; BUF_SIZE];
    let written = vsnprintf(
        buffer.as_mut_ptr() as *mut libc::c_char,
        BUF_SIZE,
        fmt,
        va_list as *mut libc::c_void,
    );

    let Ok(written) = usize::try_from(written) else {
        let errno = std::io::Error::last_os_error();
        eprintln!("failed to create log message from ffmpeg, vsnprintf returned: {errno}");
        return;
    };
    // the terminating null byte is not counted, and longer messages were cut short
    buffer.truncate(written.min(BUF_SIZE - 1));

    let body = String::from_utf8_lossy(&buffer);
    let body = body.trim_end().to_string();
    let target = format!("ffmpeg::{}", class_name(avcl));

    LOGS.with_borrow_mut(|vec| {
        vec.push(Item {
            level: map_level(level),
            target,
            body,
        })
    });
}
