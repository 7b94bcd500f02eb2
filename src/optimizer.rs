//! Image optimizer enforcing output size/dimension limits on captures.
//!
//! Two-stage geometric clamp: dimensions first (aspect-preserving), then
//! total pixel count. The original file is only ever replaced atomically;
//! any failure leaves it untouched and is non-fatal to the capture.

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{ColorType, GenericImageView, ImageEncoder};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{format_bytes, ImageLimits, WorkerError};

pub struct ImageOptimizer {
    limits: ImageLimits,
}

impl ImageOptimizer {
    pub fn new(limits: ImageLimits) -> Self {
        Self { limits }
    }

    /// Bring the image at `path` within the configured limits.
    ///
    /// No-op when all four limits are already satisfied. Otherwise the image
    /// is resized (if a dimension or pixel limit is violated) and re-encoded
    /// at fixed compression settings, then swapped in via write-then-rename
    /// so a partial file is never observable.
    pub fn optimize(&self, path: &Path) -> Result<(), WorkerError> {
        let file_size = fs::metadata(path)?.len();
        let (width, height) = image::image_dimensions(path)?;

        let oversized_file =
            file_size as f64 / (1024.0 * 1024.0) > self.limits.max_file_size_mb;
        let target = clamp_dimensions(width, height, &self.limits);

        if !oversized_file && target.is_none() {
            debug!(width, height, size = %format_bytes(file_size), "image within limits");
            return Ok(());
        }

        let img = image::open(path)?;
        let img = match target {
            Some((w, h)) => img.resize_exact(w, h, FilterType::Lanczos3),
            None => img,
        };

        let tmp = tmp_path(path);
        if let Err(e) = self.encode_png(&img, &tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, path)?;

        let new_size = fs::metadata(path)?.len();
        debug!(
            width = img.width(),
            height = img.height(),
            from = %format_bytes(file_size),
            to = %format_bytes(new_size),
            "image optimized"
        );
        Ok(())
    }

    fn encode_png(&self, img: &image::DynamicImage, path: &Path) -> Result<(), WorkerError> {
        let rgba = img.to_rgba8();
        let file = fs::File::create(path)?;
        let encoder = PngEncoder::new_with_quality(
            BufWriter::new(file),
            CompressionType::Best,
            PngFilter::Adaptive,
        );
        encoder.write_image(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os_string = path.as_os_str().to_os_string();
    os_string.push(".tmp");
    PathBuf::from(os_string)
}

/// Target dimensions for an image exceeding the limits, or `None` when the
/// dimensions already satisfy them.
///
/// Stage 1 scales both axes by the smaller of the width/height ratios,
/// preserving aspect. Stage 2 applies `sqrt(max_pixels / pixels)` if the
/// result still exceeds the pixel budget.
pub fn clamp_dimensions(width: u32, height: u32, limits: &ImageLimits) -> Option<(u32, u32)> {
    let mut w = width;
    let mut h = height;

    if w > limits.max_width || h > limits.max_height {
        let ratio = f64::min(
            limits.max_width as f64 / w as f64,
            limits.max_height as f64 / h as f64,
        );
        w = (w as f64 * ratio).floor() as u32;
        h = (h as f64 * ratio).floor() as u32;
    }

    if (w as u64) * (h as u64) > limits.max_pixels {
        let scale = (limits.max_pixels as f64 / ((w as u64 * h as u64) as f64)).sqrt();
        w = (w as f64 * scale).floor() as u32;
        h = (h as f64 * scale).floor() as u32;
    }

    if w == width && h == height {
        None
    } else {
        Some((w.max(1), h.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use uuid::Uuid;

    fn limits(max_mb: f64, max_w: u32, max_h: u32, max_px: u64) -> ImageLimits {
        ImageLimits {
            max_file_size_mb: max_mb,
            max_width: max_w,
            max_height: max_h,
            max_pixels: max_px,
        }
    }

    fn temp_png(width: u32, height: u32) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("snapqueue-test-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.png");
        let img = RgbaImage::from_pixel(width, height, Rgba([120, 40, 200, 255]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_clamp_noop_within_limits() {
        assert_eq!(clamp_dimensions(800, 600, &ImageLimits::default()), None);
    }

    #[test]
    fn test_clamp_stage_one_preserves_aspect() {
        let limits = limits(30.0, 150, 4096, 32_000_000);
        let (w, h) = clamp_dimensions(300, 200, &limits).unwrap();
        assert_eq!((w, h), (150, 100));
    }

    #[test]
    fn test_clamp_stage_two_pixel_budget() {
        let limits = limits(30.0, 2000, 2000, 250_000);
        let (w, h) = clamp_dimensions(1000, 1000, &limits).unwrap();
        assert_eq!((w, h), (500, 500));
        assert!((w as u64) * (h as u64) <= limits.max_pixels);
    }

    #[test]
    fn test_clamp_wide_capture_scenario() {
        // 10000x6000 against the default 8192/4096/32MP limits: the height
        // ratio wins stage 1 and the result stays under the pixel budget,
        // so stage 2 never fires.
        let limits = ImageLimits::default();
        let (w, h) = clamp_dimensions(10_000, 6_000, &limits).unwrap();

        assert!(w <= limits.max_width);
        assert!(h <= limits.max_height);
        assert!((w as u64) * (h as u64) <= limits.max_pixels);
        assert_eq!(w, 6826);
        assert!((4095..=4096).contains(&h));

        let original_aspect = 10_000.0 / 6_000.0;
        let clamped_aspect = w as f64 / h as f64;
        assert!((clamped_aspect - original_aspect).abs() / original_aspect < 0.001);
    }

    #[test]
    fn test_optimize_noop_leaves_bytes_untouched() {
        let path = temp_png(64, 48);
        let before = fs::read(&path).unwrap();

        let optimizer = ImageOptimizer::new(ImageLimits::default());
        optimizer.optimize(&path).unwrap();

        let after = fs::read(&path).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_optimize_resizes_oversized_image() {
        let path = temp_png(300, 200);

        let optimizer = ImageOptimizer::new(limits(30.0, 150, 4096, 32_000_000));
        optimizer.optimize(&path).unwrap();

        let (w, h) = image::image_dimensions(&path).unwrap();
        assert_eq!((w, h), (150, 100));
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_optimize_reencodes_on_file_size_violation() {
        let path = temp_png(64, 48);

        // Force the file-size path without violating any dimension limit.
        let optimizer = ImageOptimizer::new(limits(0.000001, 8192, 4096, 32_000_000));
        optimizer.optimize(&path).unwrap();

        let (w, h) = image::image_dimensions(&path).unwrap();
        assert_eq!((w, h), (64, 48));
    }

    #[test]
    fn test_optimize_missing_file_is_an_error() {
        let optimizer = ImageOptimizer::new(ImageLimits::default());
        let missing = std::env::temp_dir().join("snapqueue-test-missing.png");
        assert!(optimizer.optimize(&missing).is_err());
    }
}
