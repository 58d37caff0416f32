//! Scale engine - turns an origin into its thumbnail.
//!
//! Vector images pass through untouched. Raster images are decoded, turned
//! upright according to their EXIF orientation, resized so the output height
//! equals the requested size (width follows the aspect ratio), and
//! re-encoded as JPEG whatever the source format was.
//!
//! Decoding and encoding are CPU bound; `scale_async` runs them on the
//! blocking pool.

use crate::{
    errors::{PipelineError, PipelineResult},
    models::payload::{DerivedObject, ImageClass, JPEG_CONTENT_TYPE, OriginObject},
};
use bytes::Bytes;
use image::{
    DynamicImage, GenericImageView, ImageDecoder, ImageReader, codecs::jpeg::JpegEncoder,
    imageops::FilterType, metadata::Orientation,
};
use std::io::Cursor;
use tracing::debug;

/// Largest side a baseline JPEG can carry.
pub const MAX_JPEG_DIMENSION: u32 = 65_535;
/// Upper bound on pixels in any resize buffer, the intermediate
/// `source_width x target_height` pass included.
pub const MAX_WORKING_PIXELS: u64 = 40_000_000;

#[derive(Debug, Clone, Copy)]
pub struct ScaleEngine {
    /// JPEG quality (1-100)
    quality: u8,
}

impl Default for ScaleEngine {
    fn default() -> Self {
        Self { quality: 85 }
    }
}

impl ScaleEngine {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Produce the derivative for `origin` at `target_height` (blocking).
    pub fn scale(&self, origin: OriginObject, target_height: u32) -> PipelineResult<DerivedObject> {
        match origin.class() {
            ImageClass::Vector => {
                debug!(content_type = %origin.content_type, "vector origin passes through");
                Ok(DerivedObject {
                    bytes: origin.bytes,
                    content_type: origin.content_type,
                    class: ImageClass::Vector,
                    dimensions: None,
                })
            }
            ImageClass::Raster => {
                let (bytes, width, height) = self
                    .render_jpeg(&origin.bytes, target_height)
                    .map_err(PipelineError::Scale)?;
                debug!(width, height, size = bytes.len(), "thumbnail generated");
                Ok(DerivedObject {
                    bytes,
                    content_type: JPEG_CONTENT_TYPE.to_string(),
                    class: ImageClass::Raster,
                    dimensions: Some((width, height)),
                })
            }
        }
    }

    /// Same as [`ScaleEngine::scale`], on tokio's blocking thread pool.
    pub async fn scale_async(
        &self,
        origin: OriginObject,
        target_height: u32,
    ) -> PipelineResult<DerivedObject> {
        let engine = *self;
        tokio::task::spawn_blocking(move || engine.scale(origin, target_height))
            .await
            .map_err(|e| PipelineError::Scale(format!("scaling task failed: {e}")))?
    }

    /// Every intermediate image is an owned value local to this function and
    /// is dropped on return, on the error paths included.
    fn render_jpeg(&self, data: &[u8], target_height: u32) -> Result<(Bytes, u32, u32), String> {
        let mut decoder = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| format!("Failed to read image: {e}"))?
            .into_decoder()
            .map_err(|e| format!("Failed to decode image: {e}"))?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let mut img = DynamicImage::from_decoder(decoder)
            .map_err(|e| format!("Failed to decode image: {e}"))?;
        img.apply_orientation(orientation);

        let (orig_w, orig_h) = img.dimensions();
        let (new_w, new_h) = scaled_dimensions(orig_w, orig_h, target_height);
        debug!(
            original_width = orig_w,
            original_height = orig_h,
            width = new_w,
            height = new_h,
            "resizing raster origin"
        );

        check_resize_budget(orig_w, new_w, new_h)?;

        let resized = img.resize_exact(new_w, new_h, FilterType::Lanczos3);
        drop(img);
        // JPEG has no alpha channel.
        let rgb = resized.to_rgb8();
        drop(resized);

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode_image(&rgb)
            .map_err(|e| format!("Failed to encode JPEG: {e}"))?;

        Ok((Bytes::from(buf), new_w, new_h))
    }
}

/// Rejects resizes whose buffers could not be allocated or whose output the
/// JPEG encoder would refuse anyway.
fn check_resize_budget(source_width: u32, width: u32, height: u32) -> Result<(), String> {
    if width > MAX_JPEG_DIMENSION || height > MAX_JPEG_DIMENSION {
        return Err(format!(
            "Failed to resize: output {width}x{height} exceeds JPEG limit {MAX_JPEG_DIMENSION}"
        ));
    }
    let working = u64::from(source_width.max(width)) * u64::from(height);
    if working > MAX_WORKING_PIXELS {
        return Err(format!(
            "Failed to resize: output {width}x{height} needs {working} working pixels, limit is {MAX_WORKING_PIXELS}"
        ));
    }
    Ok(())
}

/// Height is pinned to `target_height`; width keeps the aspect ratio,
/// rounded to nearest and never below one pixel.
pub fn scaled_dimensions(width: u32, height: u32, target_height: u32) -> (u32, u32) {
    let height = u64::from(height.max(1));
    let target = u64::from(target_height.max(1));
    let new_w = (u64::from(width) * target + height / 2) / height;
    (new_w.clamp(1, u64::from(u32::MAX)) as u32, target as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(img: &DynamicImage, format: ImageFormat) -> Bytes {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        Bytes::from(buf.into_inner())
    }

    fn origin(bytes: Bytes, content_type: &str) -> OriginObject {
        OriginObject {
            content_length: bytes.len() as u64,
            bytes,
            content_type: content_type.into(),
        }
    }

    fn decoded(derived: &DerivedObject) -> DynamicImage {
        image::load_from_memory_with_format(&derived.bytes, ImageFormat::Jpeg).unwrap()
    }

    #[test]
    fn test_scaled_dimensions_pin_height() {
        assert_eq!(scaled_dimensions(100, 200, 50), (25, 50));
        assert_eq!(scaled_dimensions(1200, 800, 600), (900, 600));
        assert_eq!(scaled_dimensions(800, 1200, 600), (400, 600));
        assert_eq!(scaled_dimensions(1000, 1000, 20), (20, 20));
    }

    #[test]
    fn test_scaled_dimensions_never_collapse_width() {
        assert_eq!(scaled_dimensions(1, 5000, 20), (1, 20));
        assert_eq!(scaled_dimensions(3, 7, 20), (9, 20));
    }

    #[test]
    fn test_vector_passes_through() {
        let svg = Bytes::from_static(br#"<svg xmlns="http://www.w3.org/2000/svg"/>"#);
        let derived = ScaleEngine::default()
            .scale(origin(svg.clone(), "image/svg+xml"), 300)
            .unwrap();
        assert_eq!(derived.bytes, svg);
        assert_eq!(derived.content_type, "image/svg+xml");
        assert_eq!(derived.class, ImageClass::Vector);
        assert_eq!(derived.dimensions, None);
    }

    #[test]
    fn test_png_becomes_jpeg_at_target_height() {
        let png = encode(
            &DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 200, Rgb([200, 30, 30]))),
            ImageFormat::Png,
        );
        let derived = ScaleEngine::default()
            .scale(origin(png, "image/png"), 50)
            .unwrap();
        assert_eq!(derived.content_type, "image/jpeg");
        assert_eq!(derived.dimensions, Some((25, 50)));
        let img = decoded(&derived);
        assert_eq!(img.dimensions(), (25, 50));
    }

    #[test]
    fn test_upscales_small_jpeg() {
        let jpeg = encode(
            &DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([0, 120, 255]))),
            ImageFormat::Jpeg,
        );
        let derived = ScaleEngine::new(90)
            .scale(origin(jpeg, "image/jpeg"), 60)
            .unwrap();
        assert_eq!(decoded(&derived).dimensions(), (80, 60));
    }

    #[test]
    fn test_alpha_and_mislabelled_content_type() {
        let png = encode(
            &DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 32, Rgba([10, 20, 30, 128]))),
            ImageFormat::Png,
        );
        // Format is sniffed from the bytes, not trusted from the label.
        let derived = ScaleEngine::default()
            .scale(origin(png, "application/octet-stream"), 32)
            .unwrap();
        assert_eq!(decoded(&derived).dimensions(), (64, 32));
    }

    #[test]
    fn test_tiff_normalizes_to_jpeg() {
        let tiff = encode(
            &DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 100, Rgb([1, 2, 3]))),
            ImageFormat::Tiff,
        );
        let derived = ScaleEngine::default()
            .scale(origin(tiff, "image/tiff"), 50)
            .unwrap();
        assert_eq!(derived.content_type, "image/jpeg");
        assert_eq!(decoded(&derived).dimensions(), (150, 50));
    }

    #[test]
    fn test_same_input_same_dimensions() {
        let png = encode(
            &DynamicImage::ImageRgb8(RgbImage::from_pixel(333, 97, Rgb([9, 9, 9]))),
            ImageFormat::Png,
        );
        let engine = ScaleEngine::default();
        let a = engine.scale(origin(png.clone(), "image/png"), 41).unwrap();
        let b = engine.scale(origin(png, "image/png"), 41).unwrap();
        assert_eq!(a.dimensions, b.dimensions);
        assert_eq!(decoded(&a).dimensions(), decoded(&b).dimensions());
    }

    #[test]
    fn test_garbage_is_a_scale_error_with_codec_text() {
        let err = ScaleEngine::default()
            .scale(
                origin(Bytes::from_static(b"definitely not an image"), "image/png"),
                50,
            )
            .unwrap_err();
        match err {
            PipelineError::Scale(message) => assert!(message.starts_with("Failed to")),
            other => panic!("expected Scale error, got {other:?}"),
        }
    }

    #[test]
    fn test_extreme_aspect_ratio_is_rejected_before_resizing() {
        let strip = encode(
            &DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 1, Rgb([7, 7, 7]))),
            ImageFormat::Png,
        );
        let err = ScaleEngine::default()
            .scale(origin(strip, "image/png"), 2560)
            .unwrap_err();
        match err {
            PipelineError::Scale(message) => {
                assert_eq!(
                    message,
                    "Failed to resize: output 1024000x2560 exceeds JPEG limit 65535"
                );
            }
            other => panic!("expected Scale error, got {other:?}"),
        }
    }

    #[test]
    fn test_resize_budget() {
        assert!(check_resize_budget(100, 25, 50).is_ok());
        assert!(check_resize_budget(65_535, 65_535, 600).is_ok());
        assert!(check_resize_budget(10, 65_536, 20).is_err());
        // Wide source at a tall target overflows the intermediate pass.
        let err = check_resize_budget(20_000, 51_200, 2560).unwrap_err();
        assert!(err.contains("working pixels"));
    }

    #[tokio::test]
    async fn test_scale_async_matches_blocking() {
        let png = encode(
            &DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 40, Rgb([5, 5, 5]))),
            ImageFormat::Png,
        );
        let derived = ScaleEngine::default()
            .scale_async(origin(png, "image/png"), 20)
            .await
            .unwrap();
        assert_eq!(derived.dimensions, Some((5, 20)));
    }
}
