//! Image encoding: FBD upload bytes → base64 `ImageData`.
//!
//! The vision API takes the image as a base64 data URI in the JSON request
//! body. The bytes are sent as uploaded, without re-encoding; only the
//! MIME type is detected from content so the data URI is honest about it.

use crate::error::Fbd2ApdlError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::ImageFormat;
use tracing::debug;

/// Detect the MIME type of an FBD upload. Only JPEG and PNG are accepted.
pub fn detect_image_mime(bytes: &[u8]) -> Result<&'static str, Fbd2ApdlError> {
    if bytes.is_empty() {
        return Err(Fbd2ApdlError::UnsupportedImage {
            detail: "image is empty".into(),
        });
    }

    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Ok("image/png"),
        Ok(ImageFormat::Jpeg) => Ok("image/jpeg"),
        Ok(other) => Err(Fbd2ApdlError::UnsupportedImage {
            detail: format!("{:?} images are not supported", other),
        }),
        Err(e) => Err(Fbd2ApdlError::UnsupportedImage {
            detail: e.to_string(),
        }),
    }
}

/// Encode an FBD image as base64 ready for the vision API.
///
/// `detail: "high"` keeps small dimension labels and arrow annotations
/// legible to GPT-4-class models.
pub fn encode_image(bytes: &[u8]) -> Result<ImageData, Fbd2ApdlError> {
    let mime = detect_image_mime(bytes)?;
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} image → {} bytes base64", mime, b64.len());

    Ok(ImageData::new(b64, mime).with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn sample(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255])));
        let img = if format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(img.to_rgb8())
        } else {
            img
        };
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn png_is_detected_and_encoded_verbatim() {
        let png = sample(ImageFormat::Png);
        let data = encode_image(&png).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, png);
    }

    #[test]
    fn jpeg_is_detected() {
        let jpg = sample(ImageFormat::Jpeg);
        assert_eq!(detect_image_mime(&jpg).unwrap(), "image/jpeg");
    }

    #[test]
    fn non_image_is_rejected() {
        let err = encode_image(b"%PDF-1.5 not an image").unwrap_err();
        assert!(matches!(err, Fbd2ApdlError::UnsupportedImage { .. }));
    }

    #[test]
    fn empty_image_is_rejected() {
        assert!(matches!(
            detect_image_mime(&[]),
            Err(Fbd2ApdlError::UnsupportedImage { .. })
        ));
    }
}
