//! Request image decoding and validation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, RgbImage};
use thiserror::Error;

/// Upload filename extensions accepted by the multipart route.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

#[derive(Error, Debug)]
pub enum InputError {
    #[error("no image data provided")]
    Empty,
    #[error("invalid base64 image data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("image is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid image data: {0}")]
    Decode(String),
}

/// Decode a base64 payload, with or without a `data:image/...;base64,` prefix.
///
/// Everything up to the first comma is treated as a media-type header, so a
/// bare `image/png;base64,...` is accepted too.
pub fn decode_base64(payload: &str, limit: usize) -> Result<Vec<u8>, InputError> {
    let data = payload.split_once(',').map_or(payload, |(_, rest)| rest);
    let data = data.trim();
    if data.is_empty() {
        return Err(InputError::Empty);
    }

    // Base64 expands by 4/3, so reject obviously oversized payloads early.
    if data.len() / 4 * 3 > limit.saturating_add(3) {
        return Err(InputError::TooLarge {
            size: data.len() / 4 * 3,
            limit,
        });
    }

    let bytes = STANDARD.decode(data)?;
    check_size(bytes.len(), limit)?;
    Ok(bytes)
}

pub fn check_size(size: usize, limit: usize) -> Result<(), InputError> {
    if size == 0 {
        return Err(InputError::Empty);
    }
    if size > limit {
        return Err(InputError::TooLarge { size, limit });
    }
    Ok(())
}

/// Check an upload filename against [`ALLOWED_EXTENSIONS`].
pub fn check_extension(filename: &str) -> Result<(), InputError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(InputError::UnsupportedFormat(format!(
            "file extension '{ext}' (allowed: {})",
            ALLOWED_EXTENSIONS.join(", ")
        )))
    }
}

/// Sniff the encoding and decode to RGB. Only PNG, JPEG and WebP are accepted.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, InputError> {
    let format =
        image::guess_format(bytes).map_err(|e| InputError::Decode(format!("unrecognized image data: {e}")))?;

    match format {
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP => {}
        other => return Err(InputError::UnsupportedFormat(format!("{other:?}"))),
    }

    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| InputError::Decode(e.to_string()))?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_plain_and_data_url() {
        let png = png_bytes(3, 2);
        let plain = STANDARD.encode(&png);
        assert_eq!(decode_base64(&plain, 1 << 20).unwrap(), png);

        let url = format!("data:image/png;base64,{plain}");
        assert_eq!(decode_base64(&url, 1 << 20).unwrap(), png);

        let bare = format!("image/png;base64,{plain}");
        assert_eq!(decode_base64(&bare, 1 << 20).unwrap(), png);
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(decode_base64("not base64 !!", 1024), Err(InputError::InvalidBase64(_))));
        assert!(matches!(decode_base64("  ", 1024), Err(InputError::Empty)));
        assert!(matches!(decode_base64("data:image/png;base64,", 1024), Err(InputError::Empty)));
    }

    #[test]
    fn test_decode_enforces_limit() {
        let payload = STANDARD.encode(vec![7u8; 4096]);
        assert!(matches!(decode_base64(&payload, 1024), Err(InputError::TooLarge { .. })));
        assert!(decode_base64(&payload, 4096).is_ok());
    }

    #[test]
    fn test_extensions() {
        assert!(check_extension("hand.PNG").is_ok());
        assert!(check_extension("face.jpeg").is_ok());
        assert!(check_extension("clip.gif").is_err());
        assert!(check_extension("noext").is_err());
    }

    #[test]
    fn test_decode_image_png() {
        let image = decode_image(&png_bytes(5, 4)).unwrap();
        assert_eq!(image.dimensions(), (5, 4));
    }

    #[test]
    fn test_decode_image_rejects_gif_and_garbage() {
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";
        assert!(matches!(decode_image(gif), Err(InputError::UnsupportedFormat(_))));
        assert!(matches!(decode_image(b"plain text"), Err(InputError::Decode(_))));
    }
}
