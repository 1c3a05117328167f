use image::GrayImage;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::regression::least_squares;
use super::{FractalEstimate, MethodTag};
use crate::core::backend::ComputeBackend;

/// Minimum number of frequency/power pairs for a meaningful fit.
const MIN_RING_POINTS: usize = 5;

/// 傅里叶功率谱斜率法（1/f 分析）
///
/// 2-D FFT → shift DC to the center → squared magnitude → ring averages
/// by integer radius. The fit `log P = -β·log f + c` runs over
/// frequencies 1..min(H,W)/2 − 1; `D = (8 − β) / 2`, unclamped.
pub fn fourier_slope(backend: &dyn ComputeBackend, surface: &GrayImage) -> FractalEstimate {
    let (width, height) = surface.dimensions();
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return FractalEstimate::degenerate(MethodTag::FourierSlope);
    }

    let spectrum = fft2d(surface);
    let power = shifted_power_spectrum(&spectrum, w, h);
    let (ring_sums, ring_counts) = backend.radial_bins(&power, w, h);

    let max_r = w.min(h) / 2;
    let mut log_freqs = Vec::new();
    let mut log_powers = Vec::new();
    for freq in 1..max_r {
        let count = ring_counts[freq].max(1) as f64;
        let ring_power = ring_sums[freq] / count;
        if ring_power > 0.0 {
            log_freqs.push((freq as f64).ln());
            log_powers.push(ring_power.ln());
        }
    }

    if log_freqs.len() < MIN_RING_POINTS {
        return FractalEstimate::degenerate(MethodTag::FourierSlope);
    }

    let fit = match least_squares(&log_freqs, &log_powers) {
        Some(fit) => fit,
        None => return FractalEstimate::degenerate(MethodTag::FourierSlope),
    };

    let beta = -fit.slope;
    FractalEstimate {
        dimension: (8.0 - beta) / 2.0,
        r_squared: fit.r_squared,
        log_scales: log_freqs,
        log_counts: log_powers,
        reliable: true,
        method: MethodTag::FourierSlope,
    }
}

/// Row-column 2-D forward FFT of the intensity surface.
fn fft2d(surface: &GrayImage) -> Vec<Complex<f64>> {
    let (w, h) = (surface.width() as usize, surface.height() as usize);
    let mut buffer: Vec<Complex<f64>> = surface
        .as_raw()
        .iter()
        .map(|&p| Complex::new(p as f64, 0.0))
        .collect();

    let mut planner = FftPlanner::<f64>::new();

    let row_fft = planner.plan_fft_forward(w);
    for row in buffer.chunks_exact_mut(w) {
        row_fft.process(row);
    }

    let col_fft = planner.plan_fft_forward(h);
    let mut column = vec![Complex::new(0.0, 0.0); h];
    for x in 0..w {
        for y in 0..h {
            column[y] = buffer[y * w + x];
        }
        col_fft.process(&mut column);
        for y in 0..h {
            buffer[y * w + x] = column[y];
        }
    }

    buffer
}

/// Squared magnitudes with the zero-frequency term moved to the center.
fn shifted_power_spectrum(spectrum: &[Complex<f64>], w: usize, h: usize) -> Vec<f64> {
    let mut power = vec![0.0; w * h];
    for y in 0..h {
        let src_y = (y + h - h / 2) % h;
        for x in 0..w {
            let src_x = (x + w - w / 2) % w;
            power[y * w + x] = spectrum[src_y * w + src_x].norm_sqr();
        }
    }
    power
}
