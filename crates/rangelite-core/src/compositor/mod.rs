//! Image compositor: turns a record's partially fetched bytes into an
//! embeddable payload and swaps it into every bound element.
//!
//! With reflection enabled the bytes are decoded and drawn onto a surface of
//! the image's natural size: the blurred, vertically flipped copy first, the
//! sharp image over it, then the blurred copy again underneath whatever is
//! still transparent. Rows the truncated bytes never reached stay transparent
//! in the sharp layer, so they end up showing the reflection. The surface is
//! exported as JPEG. Without reflection the fetched bytes are embedded
//! unchanged.

mod format;
mod partial;
mod surface;

pub use format::{detect_image_format, extension_for};
pub use partial::decode_prefix;
pub use surface::{CompositeOp, Surface};

use crate::config::ReflectionConfig;
use crate::matcher::{Binding, BindingKind};
use crate::page::{DriverError, PageDriver};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops;
use thiserror::Error;

/// Compositing failure. Always local to one image.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("decode: {0}")]
    Decode(image::ImageError),
    #[error("png: {0}")]
    Png(#[from] png::DecodingError),
    #[error("gif: {0}")]
    Gif(#[from] gif::DecodingError),
    #[error("data ends before the first row")]
    NoRows,
    #[error("encode: {0}")]
    Encode(image::ImageError),
    #[error("image has no pixels")]
    Empty,
    #[error("unrecognised image format")]
    UnknownFormat,
    #[error("malformed data URI: {0}")]
    DataUri(String),
}

/// A driver failure partway through [`apply_payload`]. Elements before the
/// failing one keep the payload.
#[derive(Debug, Error)]
#[error("payload reached {applied} element(s) before failing: {source}")]
pub struct ApplyError {
    pub applied: usize,
    #[source]
    pub source: DriverError,
}

/// Encoded image ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl Payload {
    /// `data:<mime>;base64,<bytes>`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// Reflection composite of `bytes`, exported as JPEG.
pub fn reflect(bytes: &[u8], cfg: &ReflectionConfig) -> Result<Payload, ComposeError> {
    let sharp = decode_prefix(bytes)?;
    let (width, height) = sharp.dimensions();
    if width == 0 || height == 0 {
        return Err(ComposeError::Empty);
    }

    let reflection = imageops::blur(&imageops::flip_vertical(&sharp), cfg.blur_sigma);

    let mut surface = Surface::new(width, height);
    surface.draw(&reflection, CompositeOp::SourceOver);
    surface.draw(&sharp, CompositeOp::SourceOver);
    surface.draw(&reflection, CompositeOp::DestinationOver);

    let flat = surface.flatten();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, cfg.jpeg_quality)
        .encode_image(&flat)
        .map_err(ComposeError::Encode)?;

    Ok(Payload {
        mime: "image/jpeg",
        bytes: out,
    })
}

/// The fetched bytes as-is, typed by their magic bytes.
pub fn passthrough(bytes: &[u8]) -> Result<Payload, ComposeError> {
    let mime = detect_image_format(bytes).ok_or(ComposeError::UnknownFormat)?;
    Ok(Payload {
        mime,
        bytes: bytes.to_vec(),
    })
}

/// Reflection composite when `reflection` is set, otherwise the bytes unchanged.
pub fn build_payload(
    bytes: &[u8],
    reflection: Option<&ReflectionConfig>,
) -> Result<Payload, ComposeError> {
    match reflection {
        Some(cfg) => reflect(bytes, cfg),
        None => passthrough(bytes),
    }
}

/// Splits a base64 `data:` URI into its MIME type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), ComposeError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ComposeError::DataUri("missing data: scheme".to_string()))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| ComposeError::DataUri("missing ','".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| ComposeError::DataUri("not base64".to_string()))?;
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned)
        .map_err(|e| ComposeError::DataUri(e.to_string()))?;
    Ok((mime.to_string(), bytes))
}

/// Writes `data_uri` into every binding; returns how many elements took it.
///
/// Plain images get both `src` and `srcset`; everything else gets an inline
/// `background-image`. Elements that left the page are skipped.
pub async fn apply_payload(
    driver: &dyn PageDriver,
    bindings: &[Binding],
    data_uri: &str,
) -> Result<usize, ApplyError> {
    let mut applied = 0;
    for binding in bindings {
        let result = match binding.kind {
            BindingKind::PlainImage => {
                match driver.set_attribute(binding.element, "src", data_uri).await {
                    Ok(()) => driver.set_attribute(binding.element, "srcset", data_uri).await,
                    Err(e) => Err(e),
                }
            }
            BindingKind::BackgroundImage => {
                let value = format!("url(\"{}\")", data_uri);
                driver
                    .set_style(binding.element, "background-image", &value)
                    .await
            }
        };
        match result {
            Ok(()) => applied += 1,
            Err(DriverError::UnknownElement(id)) => {
                tracing::debug!(element = id.0, "bound element left the page");
            }
            Err(source) => return Err(ApplyError { applied, source }),
        }
    }
    Ok(applied)
}
