//! Training-time image augmentation
//!
//! Random horizontal flips, small rotations and brightness/contrast jitter,
//! applied to the train split only. Validation, test and inference images go
//! through [`Augmenter::preprocess`] without a generator and are only resized.

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Configuration for data augmentation
#[derive(Clone, Debug)]
pub struct AugmentationConfig {
    /// Probability of a horizontal flip
    pub horizontal_flip_prob: f32,
    /// Rotation is drawn uniformly from ±rotation_degrees
    pub rotation_degrees: f32,
    /// Brightness factor is drawn from 1.0 ± brightness
    pub brightness: f32,
    /// Contrast factor is drawn from 1.0 ± contrast
    pub contrast: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            horizontal_flip_prob: 0.5,
            rotation_degrees: 15.0,
            brightness: 0.2,
            contrast: 0.2,
        }
    }
}

impl AugmentationConfig {
    /// Disable all augmentations
    pub fn none() -> Self {
        Self {
            horizontal_flip_prob: 0.0,
            rotation_degrees: 0.0,
            brightness: 0.0,
            contrast: 0.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.horizontal_flip_prob > 0.0
            || self.rotation_degrees > 0.0
            || self.brightness > 0.0
            || self.contrast > 0.0
    }
}

/// Image augmenter that applies random transformations
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
    image_size: u32,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig, image_size: u32) -> Self {
        Self { config, image_size }
    }

    /// Augmenter that only resizes
    pub fn no_augmentation(image_size: u32) -> Self {
        Self::new(AugmentationConfig::none(), image_size)
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Apply the configured random transformations
    pub fn augment(&self, img: DynamicImage, rng: &mut ChaCha8Rng) -> DynamicImage {
        let mut result = img;

        if rng.gen::<f32>() < self.config.horizontal_flip_prob {
            result = result.fliph();
        }

        if self.config.rotation_degrees > 0.0 {
            let angle = rng.gen_range(-self.config.rotation_degrees..=self.config.rotation_degrees);
            result = rotate(&result, angle);
        }

        if self.config.brightness > 0.0 {
            let factor = 1.0 + rng.gen_range(-self.config.brightness..=self.config.brightness);
            result = adjust_brightness(&result, factor);
        }

        if self.config.contrast > 0.0 {
            let factor = 1.0 + rng.gen_range(-self.config.contrast..=self.config.contrast);
            result = adjust_contrast(&result, factor);
        }

        result
    }

    /// Resize image to the model input size
    pub fn resize(&self, img: DynamicImage) -> DynamicImage {
        img.resize_exact(
            self.image_size,
            self.image_size,
            image::imageops::FilterType::Triangle,
        )
    }

    /// Augment (when a generator is given), resize and convert to CHW data in [0, 1]
    pub fn preprocess(&self, img: DynamicImage, rng: Option<&mut ChaCha8Rng>) -> Vec<f32> {
        let img = match rng {
            Some(rng) if self.config.is_enabled() => self.augment(img, rng),
            _ => img,
        };
        to_chw(&self.resize(img))
    }
}

/// Convert an image to CHW float data normalized to [0, 1]
pub fn to_chw(img: &DynamicImage) -> Vec<f32> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let plane = width as usize * height as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = y as usize * width as usize + x as usize;
        for c in 0..3 {
            data[c * plane + offset] = pixel[c] as f32 / 255.0;
        }
    }

    data
}

/// Rotate around the center; uncovered corners are black
fn rotate(img: &DynamicImage, angle_degrees: f32) -> DynamicImage {
    if angle_degrees.abs() < 0.1 {
        return img.clone();
    }

    let angle_rad = angle_degrees.to_radians();
    let (width, height) = img.dimensions();
    let rgb = img.to_rgb8();

    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let (sin_a, cos_a) = angle_rad.sin_cos();

    let output = ImageBuffer::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        bilinear_sample(&rgb, cx + dx * cos_a + dy * sin_a, cy - dx * sin_a + dy * cos_a)
    });

    DynamicImage::ImageRgb8(output)
}

fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();
    if x < 0.0 || y < 0.0 || x >= width as f32 - 1.0 || y >= height as f32 - 1.0 {
        return Rgb([0, 0, 0]);
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}

/// Scale all channels by `factor`
fn adjust_brightness(img: &DynamicImage, factor: f32) -> DynamicImage {
    let mut rgb = img.to_rgb8();
    for pixel in rgb.pixels_mut() {
        for c in 0..3 {
            pixel[c] = (pixel[c] as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    DynamicImage::ImageRgb8(rgb)
}

/// Blend each channel with the mean luma by `factor`
fn adjust_contrast(img: &DynamicImage, factor: f32) -> DynamicImage {
    let mut rgb = img.to_rgb8();
    let count = rgb.pixels().len().max(1) as f64;
    let sum: f64 = rgb
        .pixels()
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .sum();
    let mean = (sum / count) as f32;

    for pixel in rgb.pixels_mut() {
        for c in 0..3 {
            pixel[c] = (mean + factor * (pixel[c] as f32 - mean)).round().clamp(0.0, 255.0) as u8;
        }
    }
    DynamicImage::ImageRgb8(rgb)
}
