use std::sync::Arc;

use image::GrayImage;
use log::info;
use once_cell::sync::Lazy;
use rayon::prelude::*;

/// 计算后端抽象 - 批量数组操作走这里
///
/// Estimators only see this trait; the implementation is selected once at
/// startup and injected at construction. Scalar regressions never go
/// through the backend, their inputs are one point per scale.
pub trait ComputeBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of `box_size` x `box_size` tiles containing at least one
    /// nonzero pixel. Tiles at the right/bottom border are clamped to the
    /// image, which is equivalent to zero-fill padding.
    fn occupied_boxes(&self, pattern: &GrayImage, box_size: u32) -> u64;

    /// Sum of `max - min + 1` over all tiles of the grayscale surface.
    /// Clamped border tiles are equivalent to edge-replication padding,
    /// replicated values add no new extrema.
    fn range_box_sum(&self, surface: &GrayImage, box_size: u32) -> u64;

    /// Ring sums and pixel counts by integer radius from the image center,
    /// over a row-major power spectrum.
    fn radial_bins(&self, power: &[f64], width: usize, height: usize) -> (Vec<f64>, Vec<u64>);
}

fn tile_grid(width: u32, height: u32, box_size: u32) -> (u32, u32) {
    let tiles_x = (width + box_size - 1) / box_size;
    let tiles_y = (height + box_size - 1) / box_size;
    (tiles_x, tiles_y)
}

fn occupied_in_tile_row(pixels: &[u8], width: u32, height: u32, box_size: u32, ty: u32) -> u64 {
    let (tiles_x, _) = tile_grid(width, height, box_size);
    let y0 = ty * box_size;
    let y1 = (y0 + box_size).min(height);
    let mut occupied = 0u64;
    for tx in 0..tiles_x {
        let x0 = tx * box_size;
        let x1 = (x0 + box_size).min(width);
        'tile: for y in y0..y1 {
            let row = (y * width) as usize;
            for x in x0..x1 {
                if pixels[row + x as usize] > 0 {
                    occupied += 1;
                    break 'tile;
                }
            }
        }
    }
    occupied
}

fn range_in_tile_row(pixels: &[u8], width: u32, height: u32, box_size: u32, ty: u32) -> u64 {
    let (tiles_x, _) = tile_grid(width, height, box_size);
    let y0 = ty * box_size;
    let y1 = (y0 + box_size).min(height);
    let mut sum = 0u64;
    for tx in 0..tiles_x {
        let x0 = tx * box_size;
        let x1 = (x0 + box_size).min(width);
        let mut lo = u8::MAX;
        let mut hi = u8::MIN;
        for y in y0..y1 {
            let row = (y * width) as usize;
            for x in x0..x1 {
                let v = pixels[row + x as usize];
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        sum += (hi - lo) as u64 + 1;
    }
    sum
}

fn radial_bin_len(width: usize, height: usize) -> usize {
    let cy = (height / 2) as f64;
    let cx = (width / 2) as f64;
    // farthest corner from the center
    let dy = cy.max(height as f64 - 1.0 - cy);
    let dx = cx.max(width as f64 - 1.0 - cx);
    (dy.hypot(dx) as usize) + 2
}

fn radial_bins_for_row(
    power_row: &[f64],
    width: usize,
    height: usize,
    y: usize,
    sums: &mut [f64],
    counts: &mut [u64],
) {
    let cy = (height / 2) as f64;
    let cx = (width / 2) as f64;
    let dy = y as f64 - cy;
    for (x, p) in power_row.iter().enumerate() {
        let dx = x as f64 - cx;
        let r = dy.hypot(dx) as usize;
        sums[r] += *p;
        counts[r] += 1;
    }
}

/// 串行 CPU 后端
pub struct CpuBackend;

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn occupied_boxes(&self, pattern: &GrayImage, box_size: u32) -> u64 {
        let (width, height) = pattern.dimensions();
        if width == 0 || height == 0 || box_size == 0 {
            return 0;
        }
        let (_, tiles_y) = tile_grid(width, height, box_size);
        let pixels = pattern.as_raw();
        (0..tiles_y)
            .map(|ty| occupied_in_tile_row(pixels, width, height, box_size, ty))
            .sum()
    }

    fn range_box_sum(&self, surface: &GrayImage, box_size: u32) -> u64 {
        let (width, height) = surface.dimensions();
        if width == 0 || height == 0 || box_size == 0 {
            return 0;
        }
        let (_, tiles_y) = tile_grid(width, height, box_size);
        let pixels = surface.as_raw();
        (0..tiles_y)
            .map(|ty| range_in_tile_row(pixels, width, height, box_size, ty))
            .sum()
    }

    fn radial_bins(&self, power: &[f64], width: usize, height: usize) -> (Vec<f64>, Vec<u64>) {
        let len = radial_bin_len(width, height);
        let mut sums = vec![0.0; len];
        let mut counts = vec![0u64; len];
        for (y, row) in power.chunks_exact(width).enumerate() {
            radial_bins_for_row(row, width, height, y, &mut sums, &mut counts);
        }
        (sums, counts)
    }
}

/// 多核并行后端（rayon，按 tile 行切分）
pub struct ParallelBackend;

impl ComputeBackend for ParallelBackend {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn occupied_boxes(&self, pattern: &GrayImage, box_size: u32) -> u64 {
        let (width, height) = pattern.dimensions();
        if width == 0 || height == 0 || box_size == 0 {
            return 0;
        }
        let (_, tiles_y) = tile_grid(width, height, box_size);
        let pixels = pattern.as_raw();
        (0..tiles_y)
            .into_par_iter()
            .map(|ty| occupied_in_tile_row(pixels, width, height, box_size, ty))
            .sum()
    }

    fn range_box_sum(&self, surface: &GrayImage, box_size: u32) -> u64 {
        let (width, height) = surface.dimensions();
        if width == 0 || height == 0 || box_size == 0 {
            return 0;
        }
        let (_, tiles_y) = tile_grid(width, height, box_size);
        let pixels = surface.as_raw();
        (0..tiles_y)
            .into_par_iter()
            .map(|ty| range_in_tile_row(pixels, width, height, box_size, ty))
            .sum()
    }

    fn radial_bins(&self, power: &[f64], width: usize, height: usize) -> (Vec<f64>, Vec<u64>) {
        let len = radial_bin_len(width, height);
        // per-row bins in parallel, merged serially in row order so the
        // float accumulation order stays deterministic
        let per_row: Vec<(Vec<f64>, Vec<u64>)> = power
            .par_chunks_exact(width)
            .enumerate()
            .map(|(y, row)| {
                let mut sums = vec![0.0; len];
                let mut counts = vec![0u64; len];
                radial_bins_for_row(row, width, height, y, &mut sums, &mut counts);
                (sums, counts)
            })
            .collect();

        let mut sums = vec![0.0; len];
        let mut counts = vec![0u64; len];
        for (row_sums, row_counts) in per_row {
            for (acc, v) in sums.iter_mut().zip(row_sums) {
                *acc += v;
            }
            for (acc, v) in counts.iter_mut().zip(row_counts) {
                *acc += v;
            }
        }
        (sums, counts)
    }
}

static DETECTED: Lazy<Arc<dyn ComputeBackend>> = Lazy::new(|| {
    let cores = num_cpus::get();
    let backend: Arc<dyn ComputeBackend> = if cores > 1 {
        Arc::new(ParallelBackend)
    } else {
        Arc::new(CpuBackend)
    };
    info!("Compute backend: {} ({} cores)", backend.name(), cores);
    backend
});

/// 探测一次，进程内不再变化
pub fn detect() -> Arc<dyn ComputeBackend> {
    DETECTED.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn checkerboard(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_occupied_boxes_full_coverage() {
        let img = checkerboard(16);
        let cpu = CpuBackend;
        // every 2x2 tile contains set pixels
        assert_eq!(cpu.occupied_boxes(&img, 2), 64);
        assert_eq!(cpu.occupied_boxes(&img, 4), 16);
        assert_eq!(cpu.occupied_boxes(&img, 16), 1);
    }

    #[test]
    fn test_occupied_boxes_empty() {
        let img = GrayImage::new(16, 16);
        assert_eq!(CpuBackend.occupied_boxes(&img, 2), 0);
    }

    #[test]
    fn test_occupied_boxes_clamped_border() {
        // 5x5 with a single pixel in the clamped bottom-right tile
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(4, 4, Luma([255]));
        assert_eq!(CpuBackend.occupied_boxes(&img, 2), 1);
    }

    #[test]
    fn test_range_box_sum_flat() {
        let img = GrayImage::from_pixel(8, 8, Luma([42]));
        // each tile contributes max - min + 1 = 1
        assert_eq!(CpuBackend.range_box_sum(&img, 2), 16);
    }

    #[test]
    fn test_backends_agree() {
        let img = checkerboard(33); // odd size exercises clamped tiles
        let cpu = CpuBackend;
        let par = ParallelBackend;
        for box_size in [2u32, 4, 8, 16] {
            assert_eq!(
                cpu.occupied_boxes(&img, box_size),
                par.occupied_boxes(&img, box_size)
            );
            assert_eq!(
                cpu.range_box_sum(&img, box_size),
                par.range_box_sum(&img, box_size)
            );
        }
        let power: Vec<f64> = (0..33 * 33).map(|i| i as f64).collect();
        let (s1, c1) = cpu.radial_bins(&power, 33, 33);
        let (s2, c2) = par.radial_bins(&power, 33, 33);
        assert_eq!(c1, c2);
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(CpuBackend.name(), "cpu");
        assert_eq!(ParallelBackend.name(), "parallel");
        let detected = super::detect();
        assert!(matches!(detected.name(), "cpu" | "parallel"));
    }

    #[test]
    fn test_radial_bins_dc() {
        let mut power = vec![0.0; 8 * 8];
        power[4 * 8 + 4] = 7.5; // center pixel
        let (sums, counts) = CpuBackend.radial_bins(&power, 8, 8);
        assert_eq!(sums[0], 7.5);
        assert_eq!(counts[0], 1);
    }
}
