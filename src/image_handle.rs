//! Validation of uploaded invoice images.
//!
//! Uploaded bytes are sniffed, checked against the allowed formats and fully
//! decoded once. The original encoded bytes are kept so they can be forwarded
//! to the model without re-encoding.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::{fmt, path::Path};

/// Raster formats accepted by the uploader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

/// Formats a submission may carry.
pub const ALLOWED_FORMATS: [ImageFormat; 2] = [ImageFormat::Jpeg, ImageFormat::Png];

/// File extensions offered by the upload control.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    fn to_image_format(self) -> ::image::ImageFormat {
        match self {
            ImageFormat::Jpeg => ::image::ImageFormat::Jpeg,
            ImageFormat::Png => ::image::ImageFormat::Png,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Jpeg => f.write_str("jpeg"),
            ImageFormat::Png => f.write_str("png"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageDecodeError {
    #[error("the uploaded file is empty")]
    Empty,

    #[error("the uploaded file is not a recognized image")]
    Unrecognized,

    #[error("unsupported image format: {0:?}")]
    Unsupported(::image::ImageFormat),

    #[error("the uploaded image could not be decoded: {0}")]
    Invalid(#[from] ::image::ImageError),

    #[error("could not read image file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed image data URL")]
    InvalidDataUrl,
}

/// A validated, in-memory invoice image.
#[derive(Clone)]
pub struct ImageHandle {
    bytes: Vec<u8>,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl ImageHandle {
    /// Decodes `bytes`, accepting only the formats listed in `allowed`.
    pub fn decode(bytes: Vec<u8>, allowed: &[ImageFormat]) -> Result<Self, ImageDecodeError> {
        if bytes.is_empty() {
            return Err(ImageDecodeError::Empty);
        }

        let detected =
            ::image::guess_format(&bytes).map_err(|_| ImageDecodeError::Unrecognized)?;

        let format = allowed
            .iter()
            .copied()
            .find(|f| f.to_image_format() == detected)
            .ok_or(ImageDecodeError::Unsupported(detected))?;

        let decoded = ::image::load_from_memory_with_format(&bytes, detected)?;

        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            bytes,
            format,
        })
    }

    /// Reads and decodes an image file with the default allowed formats.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageDecodeError> {
        let bytes = std::fs::read(path)?;
        Self::decode(bytes, &ALLOWED_FORMATS)
    }

    /// Decodes an image previously produced by [`ImageHandle::data_url`].
    pub fn from_data_url(url: &str) -> Result<Self, ImageDecodeError> {
        let payload = url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .map(|(_, data)| data)
            .ok_or(ImageDecodeError::InvalidDataUrl)?;

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|_| ImageDecodeError::InvalidDataUrl)?;

        Self::decode(bytes, &ALLOWED_FORMATS)
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The original encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:` URL suitable for an `<img src>` preview.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime_type(), self.to_base64())
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(width: u32, height: u32, format: ::image::ImageFormat) -> Vec<u8> {
        let img = ::image::RgbImage::from_pixel(width, height, ::image::Rgb([200, 10, 10]));
        let mut buf = Vec::new();
        ::image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        encode(width, height, ::image::ImageFormat::Png)
    }

    pub(crate) fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        encode(width, height, ::image::ImageFormat::Jpeg)
    }

    pub(crate) fn png_handle(width: u32, height: u32) -> ImageHandle {
        ImageHandle::decode(png_bytes(width, height), &ALLOWED_FORMATS).unwrap()
    }

    #[test]
    fn decodes_png() {
        let bytes = png_bytes(5, 7);
        let handle = ImageHandle::decode(bytes.clone(), &ALLOWED_FORMATS).unwrap();

        assert_eq!(handle.format(), ImageFormat::Png);
        assert_eq!((handle.width(), handle.height()), (5, 7));
        assert_eq!(handle.bytes(), bytes.as_slice());
    }

    #[test]
    fn decodes_jpeg() {
        let handle = ImageHandle::decode(jpeg_bytes(16, 8), &ALLOWED_FORMATS).unwrap();

        assert_eq!(handle.format(), ImageFormat::Jpeg);
        assert_eq!((handle.width(), handle.height()), (16, 8));
        assert_eq!(handle.format().mime_type(), "image/jpeg");
    }

    #[test]
    fn rejects_empty_upload() {
        let err = ImageHandle::decode(Vec::new(), &ALLOWED_FORMATS).unwrap_err();
        assert!(matches!(err, ImageDecodeError::Empty));
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = ImageHandle::decode(b"%PDF-1.7 invoice".to_vec(), &ALLOWED_FORMATS).unwrap_err();
        assert!(matches!(err, ImageDecodeError::Unrecognized));
    }

    #[test]
    fn rejects_format_outside_allowed_list() {
        let err = ImageHandle::decode(png_bytes(2, 2), &[ImageFormat::Jpeg]).unwrap_err();
        assert!(matches!(err, ImageDecodeError::Unsupported(::image::ImageFormat::Png)));

        // GIF magic is recognized but never allowed
        let err = ImageHandle::decode(b"GIF89a\x01\x00\x01\x00".to_vec(), &ALLOWED_FORMATS)
            .unwrap_err();
        assert!(matches!(err, ImageDecodeError::Unsupported(::image::ImageFormat::Gif)));
    }

    #[test]
    fn rejects_truncated_png() {
        let mut bytes = png_bytes(8, 8);
        bytes.truncate(20);

        let err = ImageHandle::decode(bytes, &ALLOWED_FORMATS).unwrap_err();
        assert!(matches!(err, ImageDecodeError::Invalid(_)));
    }

    #[test]
    fn maps_extensions() {
        assert_eq!(ImageFormat::from_extension("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("gif"), None);
        assert!(
            ALLOWED_EXTENSIONS
                .iter()
                .all(|ext| ImageFormat::from_extension(ext).is_some())
        );
    }

    #[test]
    fn builds_data_url() {
        let handle = png_handle(1, 1);
        let url = handle.data_url();

        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.ends_with(&handle.to_base64()));
    }

    #[test]
    fn data_url_decodes_back() {
        let handle = ImageHandle::decode(jpeg_bytes(9, 4), &ALLOWED_FORMATS).unwrap();
        let restored = ImageHandle::from_data_url(&handle.data_url()).unwrap();

        assert_eq!(restored.format(), ImageFormat::Jpeg);
        assert_eq!(restored.bytes(), handle.bytes());
    }

    #[test]
    fn rejects_malformed_data_url() {
        for url in ["", "image/png;base64,AAAA", "data:image/png,AAAA", "data:image/png;base64,@@@"] {
            let err = ImageHandle::from_data_url(url).unwrap_err();
            assert!(matches!(err, ImageDecodeError::InvalidDataUrl), "{url}");
        }
    }
}
