//! The uploaded base image every variation is derived from.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose;
use image::{ImageFormat, ImageReader};
use tracing::debug;

use crate::constants::{ACCEPTED_MEDIA_TYPES, MAX_BASE_IMAGE_BYTES};
use crate::error::MonkeyGenError;

/// A validated raster image plus the media type we send upstream.
#[derive(Clone, PartialEq, Eq)]
pub struct BaseImage {
    bytes: Vec<u8>,
    media_type: &'static str,
}

impl std::fmt::Debug for BaseImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseImage")
            .field("len", &self.bytes.len())
            .field("media_type", &self.media_type)
            .finish()
    }
}

impl BaseImage {
    /// Checks size and format of raw upload bytes.
    ///
    /// A declared media type, when given, must be one of
    /// [`ACCEPTED_MEDIA_TYPES`]; the content itself is sniffed and the sniffed
    /// type is what gets sent upstream.
    pub fn new(bytes: Vec<u8>, declared: Option<&str>) -> Result<Self, MonkeyGenError> {
        if bytes.is_empty() {
            return Err(MonkeyGenError::BadRequest("No image provided".to_string()));
        }
        if bytes.len() > MAX_BASE_IMAGE_BYTES {
            return Err(MonkeyGenError::PayloadTooLarge);
        }
        if let Some(declared) = declared.map(str::trim).filter(|value| !value.is_empty()) {
            let declared = declared.to_ascii_lowercase();
            if !ACCEPTED_MEDIA_TYPES.contains(&declared.as_str()) {
                return Err(MonkeyGenError::UnsupportedMediaType(declared));
            }
        }

        let format = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|err| MonkeyGenError::InternalServerError(err.to_string()))?
            .format();
        let media_type = match format {
            Some(ImageFormat::Png) => "image/png",
            Some(ImageFormat::Jpeg) => "image/jpeg",
            Some(ImageFormat::WebP) => "image/webp",
            other => {
                debug!("Rejecting base image with sniffed format {:?}", other);
                let name = other
                    .map(|format| format.to_mime_type().to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(MonkeyGenError::UnsupportedMediaType(name));
            }
        };

        Ok(Self { bytes, media_type })
    }

    /// Decodes a base64 payload as sent to the JSON boundaries.
    pub fn from_base64(payload: &str, declared: Option<&str>) -> Result<Self, MonkeyGenError> {
        let payload = payload.trim();
        // tolerate a full data URL
        let payload = match payload.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => payload,
        };
        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|err| MonkeyGenError::BadRequest(format!("Invalid base64 image: {err}")))?;
        Self::new(bytes, declared)
    }

    /// Raw image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Sniffed media type, e.g. `image/png`.
    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    /// Payload as standard base64.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Payload as a `data:` URL, the form the vision model takes.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.to_base64())
    }

    /// File name used for the multipart upload.
    pub fn file_name(&self) -> &'static str {
        match self.media_type {
            "image/jpeg" => "base.jpg",
            "image/webp" => "base.webp",
            _ => "base.png",
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A tiny valid image in the given format.
    pub(crate) fn sample_image_bytes(format: ImageFormat) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(4, 4, image::Rgb([120, 80, 40]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).expect("encode test image");
        out.into_inner()
    }

    pub(crate) fn sample_png() -> BaseImage {
        BaseImage::new(sample_image_bytes(ImageFormat::Png), Some("image/png"))
            .expect("valid png")
    }

    #[test]
    fn png_and_jpeg_are_sniffed() {
        let png = BaseImage::new(sample_image_bytes(ImageFormat::Png), None).expect("png");
        assert_eq!(png.media_type(), "image/png");
        assert_eq!(png.file_name(), "base.png");

        let jpeg = BaseImage::new(sample_image_bytes(ImageFormat::Jpeg), Some("image/png"))
            .expect("jpeg");
        assert_eq!(jpeg.media_type(), "image/jpeg");
    }

    #[test]
    fn rejects_bad_uploads() {
        assert_eq!(
            BaseImage::new(Vec::new(), None),
            Err(MonkeyGenError::BadRequest("No image provided".to_string()))
        );
        assert_eq!(
            BaseImage::new(vec![0u8; MAX_BASE_IMAGE_BYTES + 1], None),
            Err(MonkeyGenError::PayloadTooLarge)
        );
        assert!(matches!(
            BaseImage::new(sample_image_bytes(ImageFormat::Png), Some("image/gif")),
            Err(MonkeyGenError::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            BaseImage::new(b"This is not an image.".to_vec(), None),
            Err(MonkeyGenError::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn base64_payloads_round_into_the_same_bytes() {
        let image = sample_png();
        let decoded = BaseImage::from_base64(&image.to_base64(), None).expect("decode");
        assert_eq!(decoded, image);

        let from_url = BaseImage::from_base64(&image.to_data_url(), None).expect("data url");
        assert_eq!(from_url, image);

        assert!(matches!(
            BaseImage::from_base64("%%%", None),
            Err(MonkeyGenError::BadRequest(_))
        ));
    }
}
