//! Image payload handling.
//!
//! This module turns user-selected files into [`SelectedImage`]s, decodes
//! displayable previews, and converts image bytes to and from the base64
//! text the Gemini API carries.
//!
//! # Data URIs
//!
//! Payloads may arrive as `data:<mime>;base64,<data>` text (for example an
//! image pasted from a browser). The metadata prefix is stripped before the
//! data is sent or decoded; everything else is plain base64 of the raw file.

use crate::error::{AppError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Longest side of a decoded preview. Larger images are scaled down, which
/// also keeps previews inside the GPU texture limit.
pub const PREVIEW_MAX_SIDE: u32 = 2048;

const UNSUPPORTED_TYPE_MESSAGE: &str = "Unsupported file type. Please choose a PNG, JPEG or WEBP image.";

/// Image formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Png,
    Jpeg,
    WebP,
}

impl MediaType {
    /// File extensions offered by the file picker.
    pub const EXTENSIONS: &'static [&'static str] = &["png", "jpg", "jpeg", "webp"];

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Detects the declared format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Parses a MIME type string such as `image/png`.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects the format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Decoded RGBA pixels ready to be uploaded as a texture.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub size: [usize; 2],
    pub rgba: Vec<u8>,
}

impl Preview {
    /// Decodes encoded image bytes (PNG/JPEG/WEBP) into RGBA pixels, scaled
    /// down to at most [`PREVIEW_MAX_SIDE`] on either side.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut image = image::load_from_memory(bytes)
            .map_err(|e| AppError::encoding(format!("Failed to decode image: {}", e)))?;
        if image.width() > PREVIEW_MAX_SIDE || image.height() > PREVIEW_MAX_SIDE {
            image = image.thumbnail(PREVIEW_MAX_SIDE, PREVIEW_MAX_SIDE);
        }
        let rgba = image.to_rgba8();
        let size = [rgba.width() as usize, rgba.height() as usize];

        Ok(Self {
            size,
            rgba: rgba.into_raw(),
        })
    }
}

/// The user's chosen image together with its displayable preview.
///
/// Each instance gets a fresh id. Presentation layers key their preview
/// resources on it and release the old resource when the id changes.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    id: u64,
    file_name: String,
    media_type: MediaType,
    bytes: Arc<[u8]>,
    // Decoded on first access; None when the bytes do not decode
    preview: Arc<OnceLock<Option<Preview>>>,
}

impl SelectedImage {
    /// Builds a selected image from raw bytes with a declared media type.
    ///
    /// Files that fail to decode are still accepted; the problem surfaces
    /// when generation is attempted.
    pub fn from_bytes(file_name: impl Into<String>, media_type: MediaType, bytes: Vec<u8>) -> Self {
        Self {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            file_name: file_name.into(),
            media_type,
            bytes: bytes.into(),
            preview: Arc::new(OnceLock::new()),
        }
    }

    /// Builds a selected image from a dropped file that may lack a path.
    ///
    /// The format comes from the MIME type, then the file name's extension,
    /// then the leading bytes of the content.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when none of them names a PNG, JPEG
    /// or WEBP image.
    pub fn from_dropped(file_name: impl Into<String>, mime: &str, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        let media_type = MediaType::from_mime_type(mime)
            .or_else(|| {
                Path::new(&file_name)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(MediaType::from_extension)
            })
            .or_else(|| MediaType::from_magic_bytes(&bytes))
            .ok_or_else(|| AppError::validation(UNSUPPORTED_TYPE_MESSAGE))?;

        let file_name = if file_name.is_empty() {
            "image".to_string()
        } else {
            file_name
        };
        Ok(Self::from_bytes(file_name, media_type, bytes))
    }

    /// Reads an image file, taking the declared media type from its extension.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for extensions other than
    /// png/jpg/jpeg/webp and [`AppError::Io`] if the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let media_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(MediaType::from_extension)
            .ok_or_else(|| AppError::validation(UNSUPPORTED_TYPE_MESSAGE))?;

        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        Ok(Self::from_bytes(file_name, media_type, bytes))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview
            .get_or_init(|| match Preview::decode(&self.bytes) {
                Ok(preview) => Some(preview),
                Err(e) => {
                    tracing::warn!(file = %self.file_name, "no preview for selected image: {e}");
                    None
                }
            })
            .as_ref()
    }
}

/// The image returned by a successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultImage {
    mime_type: String,
    bytes: Vec<u8>,
}

impl ResultImage {
    /// Decodes the base64 payload of an inline-data response part.
    pub fn from_base64(mime_type: impl Into<String>, data: &str) -> Result<Self> {
        let bytes = decode_payload(data)?;
        Ok(Self {
            mime_type: mime_type.into(),
            bytes,
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The exact bytes returned by the backend, as exported by a download.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn preview(&self) -> Result<Preview> {
        Preview::decode(&self.bytes)
    }
}

/// Removes a `data:<mime>;base64,` prefix, if present.
pub fn strip_data_uri_prefix(payload: &str) -> &str {
    let trimmed = payload.trim();
    if trimmed.starts_with("data:") {
        if let Some((_, data)) = trimmed.split_once(',') {
            return data;
        }
    }
    trimmed
}

/// Encodes an image payload as base64 for transmission.
///
/// Raw bytes are encoded directly. A payload that is itself a data URI is
/// validated and returned without its metadata prefix.
///
/// # Errors
///
/// Returns [`AppError::Encoding`] if the payload is empty, is a malformed
/// data URI, or yields no data.
pub fn encode_payload(bytes: &[u8]) -> Result<String> {
    if bytes.is_empty() {
        return Err(AppError::encoding("The selected image is empty"));
    }

    let encoded = if bytes.starts_with(b"data:") {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| AppError::encoding("The selected image could not be read"))?;
        let data = strip_data_uri_prefix(text);
        // Reject payloads that would not survive the round trip
        decode_payload(data)?;
        data.to_string()
    } else {
        BASE64.encode(bytes)
    };

    if encoded.is_empty() {
        return Err(AppError::encoding("Encoding produced no data"));
    }

    Ok(encoded)
}

/// Decodes base64 image data, stripping a data URI prefix first.
pub fn decode_payload(data: &str) -> Result<Vec<u8>> {
    let bytes = BASE64
        .decode(strip_data_uri_prefix(data))
        .map_err(|e| AppError::encoding(format!("Invalid base64 image data: {}", e)))?;

    if bytes.is_empty() {
        return Err(AppError::encoding("Image data is empty"));
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn media_type_from_extension() {
        assert_eq!(MediaType::from_extension("PNG"), Some(MediaType::Png));
        assert_eq!(MediaType::from_extension("jpeg"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::from_extension("jpg"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::from_extension("webp"), Some(MediaType::WebP));
        assert_eq!(MediaType::from_extension("gif"), None);
    }

    #[test]
    fn media_type_from_magic_bytes() {
        assert_eq!(MediaType::from_magic_bytes(&png_bytes(1, 1)), Some(MediaType::Png));
        assert_eq!(
            MediaType::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(MediaType::Jpeg)
        );
        assert_eq!(
            MediaType::from_magic_bytes(b"RIFF\0\0\0\0WEBPVP8 "),
            Some(MediaType::WebP)
        );
        assert_eq!(MediaType::from_magic_bytes(b"GIF89a"), None);
    }

    #[test]
    fn selected_image_decodes_preview() {
        let image = SelectedImage::from_bytes("cat.png", MediaType::Png, png_bytes(3, 2));
        let preview = image.preview().expect("preview");
        assert_eq!(preview.size, [3, 2]);
        assert_eq!(preview.rgba.len(), 3 * 2 * 4);
    }

    #[test]
    fn oversized_preview_is_scaled_down() {
        let image = SelectedImage::from_bytes("pano.png", MediaType::Png, png_bytes(9000, 10));
        let preview = image.preview().expect("preview");
        assert!(preview.size[0] <= PREVIEW_MAX_SIDE as usize);
        assert!(preview.size[1] >= 1);
        assert_eq!(preview.rgba.len(), preview.size[0] * preview.size[1] * 4);
        // The bytes sent for generation are untouched
        assert_eq!(image.bytes(), png_bytes(9000, 10).as_slice());
    }

    #[test]
    fn dropped_file_without_name_or_mime_is_sniffed() {
        let image = SelectedImage::from_dropped("", "", png_bytes(2, 2)).unwrap();
        assert_eq!(image.media_type(), MediaType::Png);
        assert_eq!(image.file_name(), "image");

        let jpeg = SelectedImage::from_dropped("clipboard", "", vec![0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        assert_eq!(jpeg.media_type(), MediaType::Jpeg);
    }

    #[test]
    fn dropped_file_prefers_declared_type() {
        let image = SelectedImage::from_dropped("photo.webp", "image/jpeg", png_bytes(1, 1)).unwrap();
        assert_eq!(image.media_type(), MediaType::Jpeg);

        let image = SelectedImage::from_dropped("photo.webp", "", png_bytes(1, 1)).unwrap();
        assert_eq!(image.media_type(), MediaType::WebP);
    }

    #[test]
    fn dropped_unknown_content_is_rejected() {
        let err = SelectedImage::from_dropped("notes", "text/plain", b"hello".to_vec()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn undecodable_image_is_accepted_without_preview() {
        let image = SelectedImage::from_bytes("broken.png", MediaType::Png, b"not a png".to_vec());
        assert!(image.preview().is_none());
        assert_eq!(image.bytes(), b"not a png");
    }

    #[test]
    fn every_selection_gets_a_new_id() {
        let a = SelectedImage::from_bytes("a.png", MediaType::Png, png_bytes(1, 1));
        let b = SelectedImage::from_bytes("a.png", MediaType::Png, png_bytes(1, 1));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn from_path_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let err = SelectedImage::from_path(&path).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.JPG");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let image = SelectedImage::from_path(&path).unwrap();
        assert_eq!(image.file_name(), "photo.JPG");
        assert_eq!(image.media_type(), MediaType::Jpeg);
        assert_eq!(image.bytes(), &[0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn strip_prefix_only_touches_data_uris() {
        assert_eq!(strip_data_uri_prefix("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_uri_prefix("QUJD"), "QUJD");
    }

    #[test]
    fn encode_raw_bytes() {
        assert_eq!(encode_payload(b"ABC").unwrap(), "QUJD");
    }

    #[test]
    fn encode_strips_embedded_data_uri() {
        assert_eq!(encode_payload(b"data:image/png;base64,QUJD").unwrap(), "QUJD");
    }

    #[test]
    fn encode_rejects_empty_payloads() {
        assert!(matches!(encode_payload(b""), Err(AppError::Encoding(_))));
        assert!(matches!(
            encode_payload(b"data:image/png;base64,"),
            Err(AppError::Encoding(_))
        ));
    }

    #[test]
    fn result_image_keeps_exact_bytes() {
        let result = ResultImage::from_base64("image/png", "AAECAwT/").unwrap();
        assert_eq!(result.bytes(), &[0, 1, 2, 3, 4, 255]);
        assert_eq!(result.mime_type(), "image/png");
    }

    #[test]
    fn result_image_rejects_invalid_base64() {
        let err = ResultImage::from_base64("image/png", "%%%").unwrap_err();
        assert!(matches!(err, AppError::Encoding(_)));
    }
}
