use image::GrayImage;

use crate::core::backend::ComputeBackend;

/// Moisy 阈值/局部斜率盒计数结果
///
/// No single global fit: D is the mean of local slopes between
/// consecutive scales inside `scale_range`, and `dimension_std` their
/// dispersion. The method carries no R² and is always reported reliable.
#[derive(Debug, Clone)]
pub struct MoisyEstimate {
    pub dimension: f64,
    pub dimension_std: f64,
    /// Occupied-box counts, one per scale, padded-size down to 1.
    pub counts: Vec<u64>,
    /// Box sizes in pixels, descending powers of two.
    pub box_sizes: Vec<u32>,
    /// Local slope between consecutive (box size, count) pairs.
    pub local_slopes: Vec<f64>,
    /// Binarized input at the original (unpadded) shape, 0/255.
    pub pattern: GrayImage,
    pub padded_size: u32,
    pub threshold: f64,
    pub scale_range: (usize, usize),
}

impl MoisyEstimate {
    fn degenerate(pattern: GrayImage, threshold: f64, scale_range: (usize, usize)) -> Self {
        Self {
            dimension: 0.0,
            dimension_std: 0.0,
            counts: Vec::new(),
            box_sizes: Vec::new(),
            local_slopes: Vec::new(),
            pattern,
            padded_size: 0,
            threshold,
            scale_range,
        }
    }

    /// (log r, log N) series for the log-log plot, in sweep order.
    pub fn log_series(&self) -> (Vec<f64>, Vec<f64>) {
        let log_sizes = self.box_sizes.iter().map(|&r| (r as f64).ln()).collect();
        let log_counts = self.counts.iter().map(|&n| (n as f64).ln()).collect();
        (log_sizes, log_counts)
    }
}

/// 单阈值二值化 + 全尺度盒计数 + 局部斜率平均
///
/// Intensity is normalized to [0, 1] and binarized at `threshold`; the
/// pattern is zero-padded to the next power-of-two square so no scale
/// truncates the image. Box sizes sweep from the padded dimension down
/// to 1. `scale_range` is a 1-based inclusive window over the local
/// slopes, clamped to the slopes actually available.
pub fn moisy_box_count(
    backend: &dyn ComputeBackend,
    surface: &GrayImage,
    threshold: f64,
    scale_range: (usize, usize),
) -> MoisyEstimate {
    let (width, height) = surface.dimensions();
    if width == 0 || height == 0 {
        return MoisyEstimate::degenerate(GrayImage::new(width, height), threshold, scale_range);
    }

    let pattern = binarize(surface, threshold);
    if pattern.as_raw().iter().all(|&p| p == 0) {
        return MoisyEstimate::degenerate(pattern, threshold, scale_range);
    }

    let padded_size = width.max(height).next_power_of_two();
    let mut padded = GrayImage::new(padded_size, padded_size);
    image::imageops::replace(&mut padded, &pattern, 0, 0);

    let mut box_sizes = Vec::new();
    let mut counts = Vec::new();
    let mut box_size = padded_size;
    while box_size >= 1 {
        box_sizes.push(box_size);
        counts.push(backend.occupied_boxes(&padded, box_size));
        if box_size == 1 {
            break;
        }
        box_size /= 2;
    }

    if counts.len() < 2 {
        return MoisyEstimate::degenerate(pattern, threshold, scale_range);
    }

    let local_slopes: Vec<f64> = box_sizes
        .windows(2)
        .zip(counts.windows(2))
        .map(|(r, n)| {
            let dn = (n[1] as f64).ln() - (n[0] as f64).ln();
            let dr = (r[1] as f64).ln() - (r[0] as f64).ln();
            -(dn / dr)
        })
        .collect();

    let start = scale_range.0.max(1);
    let end = scale_range.1.min(local_slopes.len());
    if start > end {
        let mut estimate = MoisyEstimate::degenerate(pattern, threshold, scale_range);
        estimate.counts = counts;
        estimate.box_sizes = box_sizes;
        estimate.local_slopes = local_slopes;
        estimate.padded_size = padded_size;
        return estimate;
    }

    let window = &local_slopes[start - 1..end];
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    let variance = window.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / window.len() as f64;

    MoisyEstimate {
        dimension: mean,
        dimension_std: variance.sqrt(),
        counts,
        box_sizes,
        local_slopes,
        pattern,
        padded_size,
        threshold,
        scale_range,
    }
}

/// 归一化到 [0,1] 后按阈值二值化
fn binarize(surface: &GrayImage, threshold: f64) -> GrayImage {
    let pixels: Vec<u8> = surface
        .as_raw()
        .iter()
        .map(|&p| {
            if p as f64 / 255.0 >= threshold {
                255
            } else {
                0
            }
        })
        .collect();
    GrayImage::from_raw(surface.width(), surface.height(), pixels).expect("Invalid surface buffer")
}
