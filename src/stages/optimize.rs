//! Lossless-first image optimization for production builds.

use crate::build::{Asset, Stage, StageError};
use crate::stages::svg::minify_svg;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, ImageFormat};

/// Re-encodes raster images and minifies SVG.
///
/// PNG is re-encoded with maximum compression and JPEG at the configured
/// quality; the original bytes are kept whenever they are already smaller.
/// GIF, ICO, unknown formats and SVG that cannot be minified pass through
/// unchanged.
#[derive(Debug, Clone)]
pub struct OptimizeImage {
    jpeg_quality: u8,
}

impl OptimizeImage {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality: jpeg_quality.clamp(1, 100) }
    }

    fn optimize_png(&self, bytes: &[u8]) -> Result<Vec<u8>, StageError> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(|e| StageError::transform("optimize-image", e.to_string()))?;
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive)
            .write_image(img.as_bytes(), img.width(), img.height(), img.color())
            .map_err(|e| StageError::transform("optimize-image", e.to_string()))?;
        Ok(out)
    }

    fn optimize_jpeg(&self, bytes: &[u8]) -> Result<Vec<u8>, StageError> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
            .map_err(|e| StageError::transform("optimize-image", e.to_string()))?;
        let rgb = img.to_rgb8();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.jpeg_quality)
            .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| StageError::transform("optimize-image", e.to_string()))?;
        Ok(out)
    }
}

impl Stage for OptimizeImage {
    fn name(&self) -> &str {
        "optimize-image"
    }

    fn apply(&self, asset: Asset) -> Result<Asset, StageError> {
        let extension = asset
            .relative
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let optimized = match extension.as_str() {
            "png" => self.optimize_png(&asset.contents)?,
            "jpg" | "jpeg" => self.optimize_jpeg(&asset.contents)?,
            "svg" => match asset.text().map_err(|_| "not valid UTF-8".to_string()).and_then(minify_svg) {
                Ok(minified) => minified.into_bytes(),
                Err(reason) => {
                    tracing::debug!(file = %asset.display_name(), "copying SVG unminified: {}", reason);
                    return Ok(asset);
                }
            },
            _ => return Ok(asset),
        };

        if optimized.len() < asset.contents.len() {
            tracing::trace!(
                file = %asset.display_name(),
                before = asset.contents.len(),
                after = optimized.len(),
                "optimized image"
            );
            Ok(asset.with_contents(optimized))
        } else {
            Ok(asset)
        }
    }
}
