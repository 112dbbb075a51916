//! Decoding of truncated image data.
//!
//! A progressive fetch stops partway through the file, so the sharp layer is
//! built from whatever rows the prefix covers. Rows past the end stay
//! transparent. PNG and GIF are decoded row by row. JPEG goes through the
//! `image` decoder, which already tolerates a missing tail. WebP and
//! interlaced PNG need the complete stream.

use super::ComposeError;
use image::{Rgba, RgbaImage};
use std::io::Cursor;

/// Decodes as much of `bytes` as is present.
pub fn decode_prefix(bytes: &[u8]) -> Result<RgbaImage, ComposeError> {
    match super::detect_image_format(bytes) {
        Some("image/png") => png_prefix(bytes),
        Some("image/gif") => gif_prefix(bytes),
        _ => Ok(image::load_from_memory(bytes)
            .map_err(ComposeError::Decode)?
            .to_rgba8()),
    }
}

fn png_prefix(bytes: &[u8]) -> Result<RgbaImage, ComposeError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;
    let (width, height, interlaced) = {
        let info = reader.info();
        (info.width, info.height, info.interlaced)
    };
    if width == 0 || height == 0 {
        return Err(ComposeError::Empty);
    }
    let (color, _) = reader.output_color_type();
    let channels = color.samples();
    let mut canvas = RgbaImage::new(width, height);

    if interlaced {
        // Adam7 passes only become whole rows on the last pass.
        let mut buf = vec![0; reader.output_buffer_size()];
        reader.next_frame(&mut buf)?;
        let stride = width as usize * channels;
        for (y, row) in buf.chunks_exact(stride).take(height as usize).enumerate() {
            put_row(&mut canvas, 0, y as u32, row, channels);
        }
        return Ok(canvas);
    }

    let mut rows = 0;
    while rows < height {
        match reader.next_row() {
            Ok(Some(row)) => {
                put_row(&mut canvas, 0, rows, row.data(), channels);
                rows += 1;
            }
            Ok(None) => break,
            Err(e) if rows > 0 => {
                tracing::debug!(rows, height, error = %e, "png data ends early");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    if rows == 0 {
        return Err(ComposeError::NoRows);
    }
    Ok(canvas)
}

fn gif_prefix(bytes: &[u8]) -> Result<RgbaImage, ComposeError> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options.read_info(Cursor::new(bytes))?;
    let (width, height) = (u32::from(decoder.width()), u32::from(decoder.height()));
    if width == 0 || height == 0 {
        return Err(ComposeError::Empty);
    }

    let (left, top, frame_width, frame_height, interlaced) = match decoder.next_frame_info()? {
        Some(frame) => (
            u32::from(frame.left),
            u32::from(frame.top),
            u32::from(frame.width),
            u32::from(frame.height),
            frame.interlaced,
        ),
        None => return Err(ComposeError::NoRows),
    };

    let mut canvas = RgbaImage::new(width, height);
    let mut line = vec![0u8; frame_width as usize * 4];
    let mut rows = 0;
    for y in gif_row_order(frame_height, interlaced) {
        match decoder.fill_buffer(&mut line) {
            Ok(true) => {
                put_row(&mut canvas, left, top + y, &line, 4);
                rows += 1;
            }
            Ok(false) => break,
            Err(e) if rows > 0 => {
                tracing::debug!(rows, height = frame_height, error = %e, "gif data ends early");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    if rows == 0 {
        return Err(ComposeError::NoRows);
    }
    Ok(canvas)
}

/// Order in which a GIF frame's rows arrive in the stream.
fn gif_row_order(height: u32, interlaced: bool) -> Vec<u32> {
    if !interlaced {
        return (0..height).collect();
    }
    [(0, 8), (4, 8), (2, 4), (1, 2)]
        .into_iter()
        .flat_map(|(start, step)| (start..height).step_by(step))
        .collect()
}

/// Copies one row of 8-bit gray, gray+alpha, RGB or RGBA samples into `canvas`.
fn put_row(canvas: &mut RgbaImage, left: u32, y: u32, data: &[u8], channels: usize) {
    if y >= canvas.height() {
        return;
    }
    for (i, px) in data.chunks_exact(channels).enumerate() {
        let x = left + i as u32;
        if x >= canvas.width() {
            break;
        }
        let rgba = match *px {
            [g] => [g, g, g, 255],
            [g, a] => [g, g, g, a],
            [r, g, b] => [r, g, b, 255],
            [r, g, b, a] => [r, g, b, a],
            _ => continue,
        };
        canvas.put_pixel(x, y, Rgba(rgba));
    }
}
