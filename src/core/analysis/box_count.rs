use image::GrayImage;

use super::regression::least_squares;
use super::{FractalEstimate, MethodTag};
use crate::core::backend::ComputeBackend;

pub const DEFAULT_R2_THRESHOLD: f64 = 0.90;

/// 二维盒计数法
///
/// Box sizes double from 2 until they exceed half the shorter side. Each
/// scale contributes `(1/box_size, N)` where `N` is the number of occupied
/// tiles; D is the slope of log N over log(1/s). The reliability gate
/// (R² and the [1.0, 2.0] range for edge images) is checked before D is
/// clamped to that range.
pub fn box_count(
    backend: &dyn ComputeBackend,
    pattern: &GrayImage,
    r2_threshold: f64,
) -> FractalEstimate {
    let (width, height) = pattern.dimensions();
    if width == 0 || height == 0 || pattern.as_raw().iter().all(|&p| p == 0) {
        return FractalEstimate::degenerate(MethodTag::BoxCounting);
    }

    let min_dim = width.min(height);
    let mut log_scales = Vec::new();
    let mut log_counts = Vec::new();

    let mut box_size = 2u32;
    while box_size <= min_dim / 2 {
        let occupied = backend.occupied_boxes(pattern, box_size);
        if occupied > 0 {
            log_scales.push((1.0 / box_size as f64).ln());
            log_counts.push((occupied as f64).ln());
        }
        box_size *= 2;
    }

    let fit = match least_squares(&log_scales, &log_counts) {
        Some(fit) => fit,
        None => return FractalEstimate::degenerate(MethodTag::BoxCounting),
    };

    let slope = fit.slope;
    let reliable = fit.r_squared >= r2_threshold && (1.0..=2.0).contains(&slope);

    FractalEstimate {
        dimension: slope.clamp(1.0, 2.0),
        r_squared: fit.r_squared,
        log_scales,
        log_counts,
        reliable,
        method: MethodTag::BoxCounting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::generators::{generate_sierpinski_triangle, generate_square};
    use crate::core::backend::CpuBackend;

    #[test]
    fn test_all_zero_is_degenerate() {
        let pattern = GrayImage::new(256, 256);
        let estimate = box_count(&CpuBackend, &pattern, DEFAULT_R2_THRESHOLD);
        assert_eq!(estimate.dimension, 0.0);
        assert_eq!(estimate.r_squared, 0.0);
        assert!(estimate.log_scales.is_empty());
        assert!(estimate.log_counts.is_empty());
        assert!(!estimate.reliable);
    }

    #[test]
    fn test_square_outline_near_one() {
        let pattern = generate_square(512, false);
        let estimate = box_count(&CpuBackend, &pattern, DEFAULT_R2_THRESHOLD);
        assert!(
            (estimate.dimension - 1.0).abs() < 0.2,
            "D = {}",
            estimate.dimension
        );
        assert!(estimate.reliable);
    }

    #[test]
    fn test_sierpinski_near_theoretical() {
        let pattern = generate_sierpinski_triangle(1024, 500_000);
        let estimate = box_count(&CpuBackend, &pattern, DEFAULT_R2_THRESHOLD);
        let expected = 3f64.ln() / 2f64.ln(); // ≈ 1.585
        assert!(
            (estimate.dimension - expected).abs() < 0.1,
            "D = {}",
            estimate.dimension
        );
    }

    #[test]
    fn test_dimension_clamped_to_valid_range() {
        // a lone pixel collapses every scale to one box: slope 0, clamp to 1.0
        let mut pattern = GrayImage::new(64, 64);
        pattern.put_pixel(10, 10, image::Luma([255]));
        let estimate = box_count(&CpuBackend, &pattern, DEFAULT_R2_THRESHOLD);
        assert!(estimate.dimension >= 1.0);
        assert!(estimate.dimension <= 2.0);
        assert!(!estimate.reliable);
    }

    #[test]
    fn test_non_square_input() {
        let mut pattern = GrayImage::new(500, 300);
        for x in 0..500 {
            pattern.put_pixel(x, 150, image::Luma([255]));
        }
        let estimate = box_count(&CpuBackend, &pattern, DEFAULT_R2_THRESHOLD);
        // box sizes are bounded by the shorter side; the line is ~1-D
        assert!((estimate.dimension - 1.0).abs() < 0.2);
    }

    #[test]
    fn test_idempotent() {
        let pattern = generate_sierpinski_triangle(256, 50_000);
        let a = box_count(&CpuBackend, &pattern, DEFAULT_R2_THRESHOLD);
        let b = box_count(&CpuBackend, &pattern, DEFAULT_R2_THRESHOLD);
        assert_eq!(a.dimension.to_bits(), b.dimension.to_bits());
        assert_eq!(a.r_squared.to_bits(), b.r_squared.to_bits());
    }

    #[test]
    fn test_scale_order_ascending_box_size() {
        let pattern = generate_square(256, false);
        let estimate = box_count(&CpuBackend, &pattern, DEFAULT_R2_THRESHOLD);
        // scales are 1/box_size with box size doubling: log scales descend
        for pair in estimate.log_scales.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }
}
