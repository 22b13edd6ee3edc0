//! QR codes for sharing a link.

use crate::error::{ErrorKind, Result};
use base64::prelude::*;
use exn::ResultExt;
use qrcode::QrCode;
use qrcode::render::svg;

const MIN_DIMENSION: u32 = 200;

/// Encode `url` as a QR code and return it as an SVG `data:` URI.
pub fn encode(url: &str) -> Result<String> {
    let code = QrCode::new(url.as_bytes()).or_raise(|| ErrorKind::Qr)?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .build();
    Ok(format!("data:image/svg+xml;base64,{}", BASE64_STANDARD.encode(image)))
}
