use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed seed so validation runs are reproducible.
const CHAOS_GAME_SEED: u64 = 42;

/// 混沌游戏生成谢尔宾斯基三角形
///
/// Plots single pixels instead of filled polygons, so the box-counting
/// dimension tracks the theoretical log(3)/log(2) ≈ 1.585 closely.
pub fn generate_sierpinski_triangle(size: u32, n_points: usize) -> GrayImage {
    let mut image = GrayImage::new(size, size);
    if size == 0 {
        return image;
    }

    let margin = (size / 20) as f64;
    let s = size as f64;
    let vertices = [
        (s / 2.0, margin),          // top
        (margin, s - margin),       // bottom-left
        (s - margin, s - margin),   // bottom-right
    ];

    let mut rng = StdRng::seed_from_u64(CHAOS_GAME_SEED);
    let (mut px, mut py) = vertices[0];

    for _ in 0..n_points {
        let (vx, vy) = vertices[rng.gen_range(0..3)];
        px = (px + vx) / 2.0;
        py = (py + vy) / 2.0;
        let (x, y) = (px as i64, py as i64);
        if x >= 0 && x < size as i64 && y >= 0 && y < size as i64 {
            image.put_pixel(x as u32, y as u32, Luma([255]));
        }
    }

    image
}

/// 校准用方形（描边或填充），四周留 1/4 边距
pub fn generate_square(size: u32, filled: bool) -> GrayImage {
    let mut image = GrayImage::new(size, size);
    if size < 4 {
        return image;
    }

    let pad = size / 4;
    let hi = size - pad;

    if filled {
        for y in pad..=hi {
            for x in pad..=hi {
                image.put_pixel(x, y, Luma([255]));
            }
        }
    } else {
        for x in pad..=hi {
            image.put_pixel(x, pad, Luma([255]));
            image.put_pixel(x, hi, Luma([255]));
        }
        for y in pad..=hi {
            image.put_pixel(pad, y, Luma([255]));
            image.put_pixel(hi, y, Luma([255]));
        }
    }

    image
}
