use crate::decoder::PixelGrid;

pub const HUE_BINS: usize = 36;
pub const SATURATION_BINS: usize = 10;
pub const VALUE_BINS: usize = 10;

/// RGB 颜色直方图，每个通道等分为 `bins` 个桶，结果长度为 `bins³`，总和为 1
pub fn color_histogram(grid: &PixelGrid, bins: u32) -> Vec<f32> {
    if grid.is_empty() || bins == 0 {
        return vec![];
    }
    let bins = bins as usize;
    let bin_size = 256.0 / bins as f32;
    let bucket = |c: u8| ((c as f32 / bin_size) as usize).min(bins - 1);

    let mut hist = vec![0u32; bins * bins * bins];
    for [r, g, b] in grid.pixels() {
        hist[bucket(r) * bins * bins + bucket(g) * bins + bucket(b)] += 1;
    }

    let total = grid.len() as f32;
    hist.into_iter().map(|count| count as f32 / total).collect()
}

/// 每个通道的均值、标准差、最小值、最大值，均除以 255
///
/// 结果顺序为 `[r_mean, r_std, r_min, r_max, g_mean, ...]`
pub fn brightness_contrast(grid: &PixelGrid) -> Vec<f32> {
    if grid.is_empty() {
        return vec![];
    }
    let n = grid.len() as f64;
    let mut sum = [0f64; 3];
    let mut sum_sq = [0f64; 3];
    let mut min = [u8::MAX; 3];
    let mut max = [u8::MIN; 3];
    for pixel in grid.pixels() {
        for c in 0..3 {
            let v = pixel[c] as f64;
            sum[c] += v;
            sum_sq[c] += v * v;
            min[c] = min[c].min(pixel[c]);
            max[c] = max[c].max(pixel[c]);
        }
    }

    let mut features = Vec::with_capacity(12);
    for c in 0..3 {
        let mean = sum[c] / n;
        let std = (sum_sq[c] / n - mean * mean).max(0.0).sqrt();
        features.extend([
            (mean / 255.0) as f32,
            (std / 255.0) as f32,
            min[c] as f32 / 255.0,
            max[c] as f32 / 255.0,
        ]);
    }
    features
}

/// RGB 转 HSV，输入输出均在 [0, 1] 范围内，色相为 `角度 / 360`
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = max - min;

    let mut h = if diff == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / diff) % 6.0
    } else if max == g {
        (b - r) / diff + 2.0
    } else {
        (r - g) / diff + 4.0
    };
    h /= 6.0;
    if h < 0.0 {
        h += 1.0;
    }

    let s = if max == 0.0 { 0.0 } else { diff / max };
    (h, s, max)
}

/// HSV 直方图：色相 36 桶，饱和度 10 桶，明度 10 桶，三个直方图分别归一化
pub fn hsv_histogram(grid: &PixelGrid) -> Vec<f32> {
    if grid.is_empty() {
        return vec![];
    }
    let mut hue = [0u32; HUE_BINS];
    let mut sat = [0u32; SATURATION_BINS];
    let mut val = [0u32; VALUE_BINS];

    let bucket = |x: f32, bins: usize| ((x * bins as f32) as usize).min(bins - 1);
    for [r, g, b] in grid.pixels() {
        let (h, s, v) = rgb_to_hsv(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        hue[bucket(h, HUE_BINS)] += 1;
        sat[bucket(s, SATURATION_BINS)] += 1;
        val[bucket(v, VALUE_BINS)] += 1;
    }

    let total = grid.len() as f32;
    hue.iter().chain(&sat).chain(&val).map(|&count| count as f32 / total).collect()
}
