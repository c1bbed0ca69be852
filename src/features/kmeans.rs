use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::decoder::PixelGrid;

fn distance2(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn nearest(pixel: &[f32; 3], centroids: &[[f32; 3]]) -> usize {
    let mut best = 0;
    let mut best_dis = f32::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = distance2(pixel, c);
        if d < best_dis {
            best_dis = d;
            best = i;
        }
    }
    best
}

/// 对 RGB 像素进行 k-means 聚类，返回聚类中心
///
/// 参数：
/// - pixels: 像素列表，取值范围 0 ~ 255
/// - k: 聚类中心数量
/// - max_iter: 迭代次数
/// - seed: 初始化聚类中心使用的随机种子
///
/// 聚类中心从像素中随机抽取，每轮迭代后取整。
/// 若某个聚类没有分配到像素，则保留上一轮的中心。
pub fn kmeans_rgb(pixels: &[[f32; 3]], k: usize, max_iter: usize, seed: u64) -> Vec<[f32; 3]> {
    if pixels.is_empty() || k == 0 {
        return vec![];
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids =
        (0..k).map(|_| pixels[rng.random_range(0..pixels.len())]).collect::<Vec<_>>();

    let mut sums = vec![[0f64; 3]; k];
    let mut counts = vec![0usize; k];
    for _ in 0..max_iter {
        sums.fill([0.0; 3]);
        counts.fill(0);
        for pixel in pixels {
            let i = nearest(pixel, &centroids);
            for c in 0..3 {
                sums[i][c] += pixel[c] as f64;
            }
            counts[i] += 1;
        }
        for ((centroid, sum), &count) in centroids.iter_mut().zip(&sums).zip(&counts) {
            if count == 0 {
                continue;
            }
            for c in 0..3 {
                centroid[c] = (sum[c] / count as f64).round() as f32;
            }
        }
    }

    centroids
}

/// 提取图片的主色调，返回 `k` 个取值范围为 [0, 1] 的 RGB 颜色
pub fn dominant_colors(grid: &PixelGrid, k: usize, max_iter: usize, seed: u64) -> Vec<[f32; 3]> {
    let pixels = grid.pixels().map(|p| p.map(|c| c as f32)).collect::<Vec<_>>();
    kmeans_rgb(&pixels, k, max_iter, seed).into_iter().map(|c| c.map(|v| v / 255.0)).collect()
}
