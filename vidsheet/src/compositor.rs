//! Tiles sampled frames into one JPEG.
//!
//! Every cell is as big as the largest placed frame. Frames are anchored at the top left
//! of their cell, without centering, and row-major in the order they were given. Frames
//! beyond `rows * columns` are dropped.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, RgbImage};

use crate::config::SheetConfig;
use crate::sampler::AnnotatedFrame;

#[derive(thiserror::Error, Debug)]
pub enum ComposeError {
    #[error("there are no frames to compose")]
    EmptyInput,
    #[error("a {width}x{height} canvas is too large")]
    TooLarge { width: u64, height: u64 },
    #[error("failed to encode the canvas")]
    Encode(#[source] image::ImageError),
}

/// The size of every cell, the largest width and height among `frames`.
pub fn cell_size(frames: &[AnnotatedFrame]) -> (u32, u32) {
    frames.iter().fold((0, 0), |(w, h), frame| {
        (w.max(frame.image.width()), h.max(frame.image.height()))
    })
}

/// Where the top left corner of cell `index` is along one axis.
fn cell_offset(index: u32, cell: u32, margin: u32) -> u32 {
    margin * (index + 1) + index * cell
}

fn canvas_side(cells: u32, cell: u32, margin: u32) -> u64 {
    u64::from(cells) * u64::from(cell) + u64::from(margin) * (u64::from(cells) + 1)
}

/// The full size canvas with every frame in its cell, before any scaling.
pub fn layout(
    frames: &[AnnotatedFrame],
    config: &SheetConfig,
) -> Result<RgbImage, ComposeError> {
    if frames.is_empty() {
        return Err(ComposeError::EmptyInput);
    }
    let frames = &frames[..frames.len().min(config.capacity())];

    let (cell_width, cell_height) = cell_size(frames);
    let width = canvas_side(config.columns, cell_width, config.margin);
    let height = canvas_side(config.rows, cell_height, config.margin);
    let (Ok(canvas_width), Ok(canvas_height)) = (u32::try_from(width), u32::try_from(height))
    else {
        return Err(ComposeError::TooLarge { width, height });
    };

    let mut canvas = RgbImage::new(canvas_width, canvas_height);
    for (i, frame) in (0u32..).zip(frames) {
        let row = i / config.columns;
        let column = i % config.columns;
        let x = cell_offset(column, cell_width, config.margin);
        let y = cell_offset(row, cell_height, config.margin);
        imageops::replace(&mut canvas, &frame.image, x.into(), y.into());
    }

    Ok(canvas)
}

/// Lays out `frames`, scales the result to an `output_size` square and encodes it.
pub fn compose(frames: &[AnnotatedFrame], config: &SheetConfig) -> Result<Vec<u8>, ComposeError> {
    let canvas = layout(frames, config)?;
    log::debug!(
        "Scaling a {}x{} canvas down to {2}x{2}",
        canvas.width(),
        canvas.height(),
        config.output_size
    );
    let canvas = imageops::resize(
        &canvas,
        config.output_size,
        config.output_size,
        FilterType::Triangle,
    );

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, config.jpeg_quality)
        .encode(
            canvas.as_raw(),
            canvas.width(),
            canvas.height(),
            ColorType::Rgb8,
        )
        .map_err(ComposeError::Encode)?;
    Ok(bytes)
}
