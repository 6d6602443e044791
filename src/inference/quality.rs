//! Image quality gate
//!
//! Cheap brightness and sharpness signals computed on the luma channel.
//! Warnings are advisory and never block a prediction.

use image::DynamicImage;
use serde::Serialize;

pub const DARK_IMAGE_WARNING: &str = "Image appears too dark. Retake in better lighting.";
pub const BLURRY_IMAGE_WARNING: &str = "Image may be blurry. Hold camera steady and refocus.";

/// Thresholds below which a warning is raised
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    pub brightness_threshold: f32,
    pub blur_threshold: f32,
}

pub const DEFAULT_BRIGHTNESS_THRESHOLD: f32 = 40.0;
pub const DEFAULT_BLUR_THRESHOLD: f32 = 8.0;

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(DEFAULT_BRIGHTNESS_THRESHOLD, DEFAULT_BLUR_THRESHOLD)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub warnings: Vec<String>,
    pub brightness_mean: f32,
    pub blur_score: f32,
}

impl QualityGate {
    pub fn new(brightness_threshold: f32, blur_threshold: f32) -> Self {
        Self {
            brightness_threshold,
            blur_threshold,
        }
    }

    pub fn assess(&self, image: &DynamicImage) -> QualityReport {
        let rgb = image.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let luma: Vec<f64> = rgb
            .pixels()
            .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
            .collect();

        // Accumulate in f64: f32 sums drift on multi-megapixel photos
        let brightness_mean = mean(&luma) as f32;

        let horizontal: Vec<f64> = (0..height)
            .flat_map(|y| {
                let row = &luma[y * width..(y + 1) * width];
                row.windows(2).map(|w| w[1] - w[0])
            })
            .collect();
        let vertical: Vec<f64> = if height > 1 {
            (0..height - 1)
                .flat_map(|y| (0..width).map(move |x| (y, x)))
                .map(|(y, x)| luma[(y + 1) * width + x] - luma[y * width + x])
                .collect()
        } else {
            Vec::new()
        };
        let blur_score = (variance(&horizontal) + variance(&vertical)) as f32;

        let mut warnings = Vec::new();
        if brightness_mean < self.brightness_threshold {
            warnings.push(DARK_IMAGE_WARNING.to_string());
        }
        if blur_score < self.blur_threshold {
            warnings.push(BLURRY_IMAGE_WARNING.to_string());
        }

        QualityReport {
            warnings,
            brightness_mean,
            blur_score,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance; empty input is 0
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};

    fn checkerboard(size: u32, low: u8, high: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(size, size, |x, y| {
            let v = if (x + y) % 2 == 0 { low } else { high };
            Rgb([v, v, v])
        }))
    }

    #[test]
    fn test_dark_flat_image_gets_both_warnings() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([10, 10, 10])));
        let report = QualityGate::default().assess(&img);
        assert_eq!(report.warnings, vec![DARK_IMAGE_WARNING, BLURRY_IMAGE_WARNING]);
        assert!((report.brightness_mean - 10.0).abs() < 1e-3);
        assert_eq!(report.blur_score, 0.0);
    }

    #[test]
    fn test_bright_sharp_image_passes() {
        let report = QualityGate::default().assess(&checkerboard(16, 60, 240));
        assert!(report.warnings.is_empty());
        assert!(report.brightness_mean > 40.0);
        assert!(report.blur_score > 8.0);
    }

    #[test]
    fn test_single_row_image_has_no_vertical_term() {
        // Alternating 0/10 along one row: diffs are +-10, variance 100
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(5, 1, |x, _| {
            let v = if x % 2 == 0 { 0 } else { 10 };
            Rgb([v, v, v])
        }));
        let report = QualityGate::default().assess(&img);
        assert!((report.blur_score - 100.0).abs() < 1e-2);
    }

    #[test]
    fn test_large_photo_mean_does_not_drift() {
        // 12 MP checkerboard of 40/44: true mean 42, every diff is +-4
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(4000, 3000, |x, y| {
            let v = if (x + y) % 2 == 0 { 40 } else { 44 };
            Rgb([v, v, v])
        }));
        let report = QualityGate::default().assess(&img);
        assert!((report.brightness_mean - 42.0).abs() < 0.01, "{}", report.brightness_mean);
        assert!((report.blur_score - 32.0).abs() < 0.01, "{}", report.blur_score);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_custom_thresholds() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([100, 100, 100])));
        let report = QualityGate::new(120.0, 0.0).assess(&img);
        assert_eq!(report.warnings, vec![DARK_IMAGE_WARNING]);
    }
}
