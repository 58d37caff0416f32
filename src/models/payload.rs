//! Origin and derived payloads, and the content-type classification that
//! decides which path a payload takes through the scale engine.

use bytes::Bytes;

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// The original object as read from the store.
#[derive(Debug, Clone)]
pub struct OriginObject {
    pub bytes: Bytes,
    pub content_type: String,
    /// Length the store declared for the object.
    pub content_length: u64,
}

impl OriginObject {
    pub fn class(&self) -> ImageClass {
        ImageClass::from_content_type(&self.content_type)
    }
}

/// Whether a payload is resized or passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageClass {
    Vector,
    Raster,
}

impl ImageClass {
    /// Only SVG is vector. Anything else is handed to the raster codec, which
    /// rejects what it cannot decode.
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case(SVG_CONTENT_TYPE) {
            ImageClass::Vector
        } else {
            ImageClass::Raster
        }
    }
}

/// The thumbnail produced for one request.
#[derive(Debug, Clone)]
pub struct DerivedObject {
    pub bytes: Bytes,
    pub content_type: String,
    pub class: ImageClass,
    /// Output `(width, height)` for raster thumbnails.
    pub dimensions: Option<(u32, u32)>,
}
