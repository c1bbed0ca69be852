use ndarray::Array2;

use super::kernel::{LAPLACIAN, clamp_u8, convolve};
use crate::decoder::PixelGrid;

/// 纹理特征：`[边缘均值, 边缘标准差, 熵, LBP 直方图前 8 项]`
pub fn texture_features(grid: &PixelGrid) -> Vec<f32> {
    if grid.is_empty() {
        return vec![];
    }
    let edges = clamp_u8(&convolve(&grid.gray(), &LAPLACIAN));

    let n = edges.len() as f64;
    let mean = edges.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = edges.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;

    let mut features = Vec::with_capacity(11);
    features.push((mean / 255.0) as f32);
    features.push((variance.sqrt() / 255.0) as f32);
    features.push(entropy(&edges));
    features.extend(local_binary_pattern(&edges));
    features
}

/// 256 级直方图的香农熵，除以 log2(256) 归一化到 [0, 1]
pub fn entropy(values: &Array2<u8>) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut hist = [0u32; 256];
    for &v in values {
        hist[v as usize] += 1;
    }
    let total = values.len() as f64;
    let entropy = hist
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum::<f64>();
    (entropy / 8.0) as f32
}

/// 简化的 LBP：对每个内部像素，比较 8 个邻居与中心的大小得到 8 位编码，
/// 返回编码直方图的前 8 项，按内部像素数量归一化
pub fn local_binary_pattern(values: &Array2<u8>) -> [f32; 8] {
    let (h, w) = values.dim();
    if h < 3 || w < 3 {
        return [0.0; 8];
    }
    // 从左上角开始顺时针
    const NEIGHBORS: [(isize, isize); 8] =
        [(-1, -1), (-1, 0), (-1, 1), (0, 1), (1, 1), (1, 0), (1, -1), (0, -1)];

    let mut hist = [0u32; 256];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = values[[y, x]];
            let mut code = 0u8;
            for (i, (dy, dx)) in NEIGHBORS.iter().enumerate() {
                let ny = (y as isize + dy) as usize;
                let nx = (x as isize + dx) as usize;
                if values[[ny, nx]] >= center {
                    code |= 1 << i;
                }
            }
            hist[code as usize] += 1;
        }
    }

    let total = ((h - 2) * (w - 2)) as f32;
    let mut result = [0.0; 8];
    for (r, &count) in result.iter_mut().zip(&hist[..8]) {
        *r = count as f32 / total;
    }
    result
}
