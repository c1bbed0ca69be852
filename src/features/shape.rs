use std::f32::consts::PI;

use super::kernel::{SOBEL_X, SOBEL_Y, convolve};
use crate::decoder::PixelGrid;

pub const DIRECTION_BINS: usize = 8;

/// 将 [-π, π] 的梯度方向映射到 8 个等分扇区
pub fn direction_bin(theta: f32) -> usize {
    (((theta + PI) / (2.0 * PI)) * DIRECTION_BINS as f32) as usize % DIRECTION_BINS
}

/// 形状特征：`[平均梯度幅值 / 255, 边缘密度, 8 个方向的直方图]`
///
/// 边缘密度为梯度幅值超过平均值一半的像素比例
pub fn shape_features(grid: &PixelGrid) -> Vec<f32> {
    if grid.is_empty() {
        return vec![];
    }
    let gray = grid.gray();
    let gx = convolve(&gray, &SOBEL_X);
    let gy = convolve(&gray, &SOBEL_Y);

    let mut magnitudes = Vec::with_capacity(gray.len());
    let mut directions = [0u32; DIRECTION_BINS];
    for (&x, &y) in gx.iter().zip(gy.iter()) {
        let (x, y) = (x as f32, y as f32);
        magnitudes.push((x * x + y * y).sqrt());
        directions[direction_bin(y.atan2(x))] += 1;
    }

    let total = magnitudes.len() as f32;
    let average = magnitudes.iter().map(|&m| m as f64).sum::<f64>() as f32 / total;
    let strong = magnitudes.iter().filter(|&&m| m > average * 0.5).count();

    let mut features = Vec::with_capacity(2 + DIRECTION_BINS);
    features.push(average / 255.0);
    features.push(strong as f32 / total);
    features.extend(directions.iter().map(|&count| count as f32 / total));
    features
}
