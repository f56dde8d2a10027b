extern crate ffmpeg_next as ffmpeg;

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use super::ffmpeg_log;
use super::logger::{self, fault, warning};
use super::timestamp::Timestamp;
use crate::source::VideoSource;

use ffmpeg::codec::Context as CodecContext;
use ffmpeg::decoder::Video as DecoderVideo;
use ffmpeg::format::context::Input as FormatContext;
use ffmpeg::format::{input_with_dictionary, Pixel};
use ffmpeg::frame::Video as FrameVideo;
use ffmpeg::media::Type;
use ffmpeg::software::scaling::context::Context as ScalingContext;
use ffmpeg::{Dictionary, Packet as CodecPacket, Rational, Rescale};
use ffmpeg_sys_next::{AV_NOPTS_VALUE, AV_TIME_BASE_Q};
use image::RgbImage;

#[derive(thiserror::Error, Debug)]
pub enum VideoError {
    #[error("failed to initialize ffmpeg")]
    Init(#[source] ffmpeg::Error),
    #[error("failed to open the file")]
    Open(#[source] ffmpeg::Error),
    #[error("the file has no video stream")]
    NoVideoStream,
    #[error("no decoder found for the video stream")]
    NoCodec(#[source] ffmpeg::Error),
    #[error("the decoder does not know its pixel format")]
    NoPixelFormat,
    #[error("failed to create the pixel format converter")]
    Converter(#[source] ffmpeg::Error),
    #[error("failed to seek to {at}")]
    Seek {
        at: Timestamp,
        #[source]
        source: ffmpeg::Error,
    },
    #[error("decoder error when receiving a frame from it")]
    Receive(#[source] ffmpeg::Error),
    #[error("failed to read a packet from the stream")]
    ReadPacket(#[source] ffmpeg::Error),
    #[error("failed to send EOF to the decoder")]
    SendEof(#[source] ffmpeg::Error),
    #[error("failed to convert the decoded frame")]
    Convert(#[source] ffmpeg::Error),
}

pub type Result<T> = std::result::Result<T, VideoError>;

static FFMPEG_INITIALIZED: OnceLock<std::result::Result<(), ffmpeg::Error>> =
    OnceLock::new();

/// A decoder bound to one open video file. Everything ffmpeg allocated for it is freed
/// when it is dropped, so scoping a handle is enough to guarantee its release.
pub struct VideoHandle<L: logger::Logger = logger::LogLogger> {
    logger: L,

    // ffmpeg contexts
    ictx: FormatContext,
    decoder: DecoderVideo,
    converter: ScalingContext,

    // internal timestamp bookkeeping
    seek_target_timestamp: i64,
    cur_timestamp: i64,

    // constants/metadata
    length: i64,
    first_timestamp: i64,
    timebase: Rational,
    video_stream_index: usize,
    orientation: Orientation,
    frame_count: u64,
    fps: f64,
}

impl VideoHandle<logger::LogLogger> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_logger(path, logger::LogLogger)
    }
}

impl<L> VideoHandle<L>
where
    L: logger::Logger,
{
    pub fn open_with_logger(path: impl AsRef<Path>, logger: L) -> Result<Self> {
        if let Err(e) = FFMPEG_INITIALIZED.get_or_init(|| {
            ffmpeg::init()?;
            ffmpeg_log::install();
            Ok(())
        }) {
            return Err(VideoError::Init(*e));
        }

        let options = {
            let mut options = Dictionary::new();
            options.set("analyzeduration", "10M");
            options.set("probesize", "5M");
            options
        };
        let opened = input_with_dictionary(&path, options);
        ffmpeg_log::drain_into(&logger);
        let mut ictx = opened.map_err(VideoError::Open)?;

        let video = ictx
            .streams()
            .best(Type::Video)
            .ok_or(VideoError::NoVideoStream)?;

        let video_stream_index = video.index();
        let timebase = video.time_base();
        let first_timestamp = if video.start_time() == AV_NOPTS_VALUE {
            warning!(logger, "The video stream has no start time, assuming zero");
            0
        } else {
            video.start_time()
        };
        let length = if video.duration() != AV_NOPTS_VALUE {
            video.duration()
        } else if ictx.duration() != AV_NOPTS_VALUE {
            ictx.duration().rescale(AV_TIME_BASE_Q, timebase)
        } else {
            warning!(logger, "Neither the stream nor the file has a duration");
            0
        };
        let length = length.max(0);

        let fps = fps_of(video.avg_frame_rate())
            .or_else(|| fps_of(video.rate()))
            .unwrap_or(0.0);
        let frame_count = match u64::try_from(video.frames()) {
            Ok(frames) if frames > 0 => frames,
            _ => estimate_frame_count(
                Timestamp::new(length, timebase, 0).to_duration(),
                fps,
            ),
        };

        let orientation = match get_orientation(&video) {
            Some(x) => x,
            None => {
                warning!(logger, "Got a weird orientation angle, ignoring");
                Orientation::Normal
            }
        };

        let decoder = CodecContext::from_parameters(video.parameters())
            .map_err(VideoError::NoCodec)?
            .decoder()
            .video()
            .map_err(VideoError::NoCodec)?;

        let converter = Self::pixel_converter(&decoder)?;

        ictx.streams_mut()
            .filter(|stream| stream.index() != video_stream_index)
            .for_each(|mut stream| stream_set_discard_all(&mut stream));

        let myself = Self {
            logger,
            ictx,
            decoder,
            converter,
            seek_target_timestamp: first_timestamp,
            cur_timestamp: first_timestamp,
            length,
            first_timestamp,
            timebase,
            video_stream_index,
            orientation,
            frame_count,
            fps,
        };
        myself.log_ffmpeg_logs();
        Ok(myself)
    }

    fn log_ffmpeg_logs(&self) {
        ffmpeg_log::drain_into(&self.logger);
    }

    fn pixel_converter(decoder: &DecoderVideo) -> Result<ScalingContext> {
        if decoder.format() == Pixel::None {
            return Err(VideoError::NoPixelFormat);
        }
        ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            // http://git.videolan.org/?p=ffmpeg.git;a=blob;f=libavutil/pixfmt.h;hb=HEAD
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::Flags::FAST_BILINEAR,
        )
        .map_err(VideoError::Converter)
    }

    /// Decodes the next frame at or after the last seek target. `None` at the end of the
    /// stream.
    pub fn next_frame(&mut self) -> Result<Option<(Timestamp, RgbImage)>> {
        while let Some((ts, frame)) = self.decode_next()? {
            if ts < self.seek_target_timestamp {
                continue;
            }
            let img = self.convert(&frame)?;
            return Ok(Some((self.timestamp(ts), img)));
        }
        Ok(None)
    }

    /// The next frame out of the decoder, in presentation order, together with its
    /// timestamp. Frames without a timestamp are skipped.
    fn decode_next(&mut self) -> Result<Option<(i64, FrameVideo)>> {
        loop {
            loop {
                let mut frame = FrameVideo::empty();
                // avcodec_receive_frame
                // https://ffmpeg.org/doxygen/trunk/group__lavc__decoding.html#ga11e6542c4e66d3028668788a1a74217c
                match {
                    let ret = self.decoder.receive_frame(&mut frame);
                    self.log_ffmpeg_logs();
                    ret
                } {
                    Ok(()) => (),
                    Err(ffmpeg::Error::Other {
                        errno: libc::EAGAIN,
                    }) => break,
                    Err(ffmpeg::Error::Eof) => return Ok(None),
                    Err(e) => return Err(VideoError::Receive(e)),
                }

                if let Some(ts) = frame.timestamp() {
                    self.cur_timestamp = ts;
                    return Ok(Some((ts, frame)));
                }

                let after = self.timestamp(self.cur_timestamp);
                warning!(
                    self.logger,
                    "Frame doesn't have a timestamp somewhere after: {}",
                    after
                );
            }

            loop {
                // http://ffmpeg.org/doxygen/trunk/group__lavf__decoding.html#ga4fdb3084415a82e3810de6ee60e46a61
                let mut packet = CodecPacket::empty();
                match {
                    let ret = packet.read(&mut self.ictx);
                    self.log_ffmpeg_logs();
                    ret
                } {
                    Ok(()) if packet.stream() == self.video_stream_index => {
                        match {
                            let ret = self.decoder.send_packet(&packet);
                            self.log_ffmpeg_logs();
                            ret
                        } {
                            Ok(()) => break,
                            Err(e) => {
                                fault!(self.logger, "Failed to decode frame: {}", e);
                                continue;
                            }
                        }
                    }
                    Ok(()) => continue,
                    Err(ffmpeg::Error::Eof) => {
                        self.decoder.send_eof().map_err(VideoError::SendEof)?;
                        break;
                    }
                    Err(e) => return Err(VideoError::ReadPacket(e)),
                }
            }
        }
    }

    fn convert(&mut self, frame: &FrameVideo) -> Result<RgbImage> {
        let mut converted = FrameVideo::empty();
        self.converter
            .run(frame, &mut converted)
            .map_err(VideoError::Convert)?;
        let img = create_rust_image(converted);
        Ok(undo_rotation(img, self.orientation))
    }

    /// Seeks to `at` from the start of the video, with millisecond precision. The next
    /// call to [`Self::next_frame`] returns the first frame at or after it.
    pub fn seek(&mut self, at: Duration) -> Result<()> {
        let at = Timestamp::from_duration(at);
        let target = self.first_timestamp + at.offset_in(self.timebase);

        let Self {
            ictx,
            video_stream_index,
            decoder,
            seek_target_timestamp,
            ..
        } = self;

        // prefer a keyframe before the target so that it can be decoded up to, but take
        // anything if there is none
        seek_file(ictx, *video_stream_index, i64::MIN, target, target)
            .or_else(|_| seek_file(ictx, *video_stream_index, i64::MIN, target, i64::MAX))
            .map_err(|source| VideoError::Seek { at, source })?;
        decoder.flush();
        *seek_target_timestamp = target;
        self.log_ffmpeg_logs();
        Ok(())
    }

    /// The frame on screen at `at`: the last one starting at or before it. The last frame
    /// stays on screen until the end of the video, `None` only if `at` is past that.
    pub fn frame_at(&mut self, at: Duration) -> Result<Option<RgbImage>> {
        self.seek(at)?;
        let target = self.seek_target_timestamp;

        let mut shown: Option<FrameVideo> = None;
        while let Some((ts, frame)) = self.decode_next()? {
            if ts == target {
                return self.convert(&frame).map(Some);
            }
            if ts > target {
                // the seek might have landed after the target, then this is the closest
                let frame = shown.unwrap_or(frame);
                return self.convert(&frame).map(Some);
            }
            shown = Some(frame);
        }

        match shown {
            Some(frame) if at <= VideoSource::duration(self) => self.convert(&frame).map(Some),
            _ => Ok(None),
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Zero if the file doesn't say.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    fn timestamp(&self, ts: i64) -> Timestamp {
        Timestamp::new(ts, self.timebase, self.first_timestamp)
    }
}

impl<L: logger::Logger> VideoSource for VideoHandle<L> {
    type Error = VideoError;

    fn frame_count(&self) -> u64 {
        VideoHandle::frame_count(self)
    }

    fn fps(&self) -> f64 {
        VideoHandle::fps(self)
    }

    fn frame_at(&mut self, at: Duration) -> Result<Option<RgbImage>> {
        VideoHandle::frame_at(self, at)
    }
}

impl<L: logger::Logger> Drop for VideoHandle<L> {
    fn drop(&mut self) {
        self.log_ffmpeg_logs();
    }
}

fn fps_of(rate: Rational) -> Option<f64> {
    (rate.numerator() > 0 && rate.denominator() > 0).then(|| f64::from(rate))
}

/// What decoders usually report when the container doesn't store the number of frames.
fn estimate_frame_count(length: Duration, fps: f64) -> u64 {
    if !(fps.is_finite() && fps > 0.0) {
        return 0;
    }
    (length.as_secs_f64() * fps).round() as u64
}

#[derive(Clone, Copy, Debug)]
enum Orientation {
    Normal,
    Left,
    Right,
    Upside,
}

fn get_orientation(video: &ffmpeg::Stream) -> Option<Orientation> {
    for data in video.side_data() {
        if data.kind() != ffmpeg::packet::side_data::Type::DisplayMatrix {
            continue;
        }
        let rot = unsafe {
            ffmpeg_sys_next::av_display_rotation_get(data.data().as_ptr() as *const i32)
        };

        if rot.is_finite() {
            return match rot.round() as i32 {
                -90 => Some(Orientation::Right),
                90 => Some(Orientation::Left),
                0 => Some(Orientation::Normal),
                180 | -180 => Some(Orientation::Upside),
                _ => None,
            };
        }
    }

    Some(Orientation::Normal)
}

fn undo_rotation(img: RgbImage, ori: Orientation) -> RgbImage {
    match ori {
        Orientation::Normal => img,
        Orientation::Right => image::imageops::rotate90(&img),
        Orientation::Left => image::imageops::rotate270(&img),
        Orientation::Upside => image::imageops::rotate180(&img),
    }
}

fn create_rust_image(converted: FrameVideo) -> RgbImage {
    assert_eq!(Pixel::RGB24, converted.format());
    assert_eq!(1, converted.planes());

    let width = converted.width();
    let height = converted.height();
    let src_linesize = converted.stride(0);
    let trg_linesize = 3 * width as usize;
    let data = converted.data(0);

    // rows may be padded, https://stackoverflow.com/a/57666844
    let data = if src_linesize == trg_linesize {
        data.to_vec()
    } else {
        assert!(src_linesize >= trg_linesize);
        data.chunks(src_linesize)
            .take(height as usize)
            .flat_map(|row| &row[..trg_linesize])
            .copied()
            .collect()
    };

    RgbImage::from_vec(width, height, data).expect("the buffer is big enough!")
}

fn stream_set_discard_all(stream: &mut ffmpeg::StreamMut<'_>) {
    unsafe {
        let ptr = stream.as_mut_ptr();
        if !ptr.is_null() {
            (*ptr).discard = ffmpeg_sys_next::AVDiscard::AVDISCARD_ALL;
        }
    }
}

/// `avformat_seek_file` on a specific stream. The keyframe landed on is in `min..=max`,
/// as close to `ts` as possible.
fn seek_file(
    input: &mut FormatContext,
    stream_index: usize,
    min: i64,
    ts: i64,
    max: i64,
) -> std::result::Result<(), ffmpeg::Error> {
    let stream_index = stream_index
        .try_into()
        .expect("will probably not be that big");
    unsafe {
        match ffmpeg_sys_next::avformat_seek_file(
            input.as_mut_ptr(),
            stream_index,
            min,
            ts,
            max,
            0,
        ) {
            s if s >= 0 => Ok(()),
            e => Err(ffmpeg::Error::from(e)),
        }
    }
}

impl<L: logger::Logger> fmt::Debug for VideoHandle<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            first_timestamp,
            length,
            timebase,
            cur_timestamp,
            seek_target_timestamp,
            frame_count,
            fps,
            ..
        } = self;

        f.debug_struct("VideoHandle")
            .field("first_ts", first_timestamp)
            .field("length", length)
            .field("cur_ts", cur_timestamp)
            .field(
                "tb",
                &format_args!("{}/{}", timebase.numerator(), timebase.denominator()),
            )
            .field("seek_ts", seek_target_timestamp)
            .field("frames", frame_count)
            .field("fps", fps)
            .finish()
    }
}
