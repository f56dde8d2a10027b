use std::time::Duration;

use image::RgbImage;
use plotters::prelude::*;

use crate::video_handle::Timestamp;

const FONT_FAMILY: &str = "sans-serif";
const FONT_SIZE: f64 = 30.0;
const POSITION: (i32, i32) = (10, 8);

#[derive(thiserror::Error, Debug)]
#[error("failed to draw the label: {0}")]
pub struct LabelError(pub(crate) String);

/// `Time: HH:MM:SS.mmm`
pub fn elapsed_label(at: Duration) -> String {
    format!("Time: {}", Timestamp::from_duration(at))
}

/// Draws `text` in white, anti-aliased, in the top left corner of `frame`.
pub fn draw_label(frame: &mut RgbImage, text: &str) -> Result<(), LabelError> {
    let dimensions = frame.dimensions();
    let buffer: &mut [u8] = &mut *frame;

    let root = BitMapBackend::with_buffer(buffer, dimensions).into_drawing_area();
    let style = (FONT_FAMILY, FONT_SIZE).into_font().color(&WHITE);
    root.draw_text(text, &style, POSITION)
        .map_err(|e| LabelError(e.to_string()))?;
    root.present().map_err(|e| LabelError(e.to_string()))?;
    Ok(())
}
