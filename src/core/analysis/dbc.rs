use image::GrayImage;

use super::regression::least_squares;
use super::{FractalEstimate, MethodTag};
use crate::core::backend::ComputeBackend;

/// 差分盒计数法（灰度表面）
///
/// Same doubling loop as plain box counting but the sweep stops at a
/// quarter of the shorter side and each tile contributes the number of
/// intensity boxes needed to span its range (`max - min + 1`). No clamp
/// and no reliability gate; callers comparing methods apply their own.
pub fn differential_box_count(
    backend: &dyn ComputeBackend,
    surface: &GrayImage,
) -> FractalEstimate {
    let (width, height) = surface.dimensions();
    if width == 0 || height == 0 {
        return FractalEstimate::degenerate(MethodTag::DifferentialBoxCounting);
    }

    let min_dim = width.min(height);
    let mut log_scales = Vec::new();
    let mut log_counts = Vec::new();

    let mut box_size = 2u32;
    while box_size <= min_dim / 4 {
        let range_sum = backend.range_box_sum(surface, box_size);
        if range_sum > 0 {
            log_scales.push((1.0 / box_size as f64).ln());
            log_counts.push((range_sum as f64).ln());
        }
        box_size *= 2;
    }

    let fit = match least_squares(&log_scales, &log_counts) {
        Some(fit) => fit,
        None => return FractalEstimate::degenerate(MethodTag::DifferentialBoxCounting),
    };

    FractalEstimate {
        dimension: fit.slope,
        r_squared: fit.r_squared,
        log_scales,
        log_counts,
        reliable: true,
        method: MethodTag::DifferentialBoxCounting,
    }
}
