use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::core::frame::Frame;

/// 边缘检测方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeMethod {
    Canny,
    Sobel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    Auto,
    Manual,
}

/// 预处理配置 - 灰度 → 高斯模糊 → 边缘二值化
#[derive(Debug, Clone, Copy)]
pub struct PreprocessConfig {
    pub method: EdgeMethod,
    pub threshold_mode: ThresholdMode,
    pub manual_thresholds: (u8, u8),
    /// Gaussian kernel size in pixels, 0 disables smoothing
    pub blur_kernel_size: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            method: EdgeMethod::Canny,
            threshold_mode: ThresholdMode::Auto,
            manual_thresholds: (100, 200),
            blur_kernel_size: 5,
        }
    }
}

/// Binarized edge map of a frame. Edge pixels are 255, background 0.
///
/// Inputs too small for a gradient stencil come back as an empty pattern
/// rather than an error.
pub fn preprocess(frame: &Frame, config: &PreprocessConfig) -> GrayImage {
    let gray = frame.to_gray();
    preprocess_gray(&gray, config)
}

pub fn preprocess_gray(gray: &GrayImage, config: &PreprocessConfig) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return GrayImage::new(width, height);
    }

    let smoothed = if config.blur_kernel_size > 0 {
        gaussian_blur_f32(gray, sigma_for_kernel(config.blur_kernel_size))
    } else {
        gray.clone()
    };

    match config.method {
        EdgeMethod::Canny => {
            let (low, high) = match config.threshold_mode {
                ThresholdMode::Auto => auto_canny_bounds(&smoothed),
                ThresholdMode::Manual => (
                    config.manual_thresholds.0 as f32,
                    config.manual_thresholds.1 as f32,
                ),
            };
            // canny requires a strictly increasing band
            let high = if high > low { high } else { low + 1.0 };
            canny(&smoothed, low, high)
        }
        EdgeMethod::Sobel => sobel_binarize(&smoothed, config.manual_thresholds.0),
    }
}

/// OpenCV 的核尺寸 → sigma 换算
fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// lower = 0.66·median, upper = 1.33·median, both clamped to [0, 255]
fn auto_canny_bounds(gray: &GrayImage) -> (f32, f32) {
    let median = median_intensity(gray) as f32;
    let lower = (0.66 * median).clamp(0.0, 255.0);
    let upper = (1.33 * median).clamp(0.0, 255.0);
    (lower, upper)
}

fn median_intensity(gray: &GrayImage) -> u8 {
    let mut histogram = [0u32; 256];
    for px in gray.as_raw() {
        histogram[*px as usize] += 1;
    }
    let half = (gray.len() as u32 + 1) / 2;
    let mut seen = 0u32;
    for (value, count) in histogram.iter().enumerate() {
        seen += count;
        if seen >= half {
            return value as u8;
        }
    }
    0
}

/// Sobel 梯度幅值 → 0-255 → 按下阈值二值化
fn sobel_binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);

    let magnitudes: Vec<f64> = gx
        .as_raw()
        .iter()
        .zip(gy.as_raw())
        .map(|(&x, &y)| ((x as f64).powi(2) + (y as f64).powi(2)).sqrt())
        .collect();

    let max = magnitudes.iter().cloned().fold(0.0f64, f64::max);
    if max <= 0.0 {
        return GrayImage::new(gray.width(), gray.height());
    }

    let edges: Vec<u8> = magnitudes
        .iter()
        .map(|&m| {
            let scaled = (255.0 * m / max) as u8;
            // strictly above the threshold, matching binary thresholding
            if scaled > threshold {
                255
            } else {
                0
            }
        })
        .collect();

    GrayImage::from_raw(gray.width(), gray.height(), edges).expect("Invalid gradient buffer")
}
