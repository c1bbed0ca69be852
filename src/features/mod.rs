mod color;
mod kernel;
mod kmeans;
mod shape;
mod texture;

use std::fmt;
use std::str::FromStr;

use image::GenericImageView;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::color::*;
pub use self::kmeans::*;
pub use self::shape::*;
pub use self::texture::*;
use crate::FeatureOptions;
use crate::decoder::{PixelGrid, decode_image};
use crate::error::Result;

/// 颜色直方图使用的工作分辨率
pub const HISTOGRAM_SIZE: u32 = 128;
/// 其余特征使用的工作分辨率
pub const GRID_SIZE: u32 = 64;

/// 特征通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    ColorHistogram,
    DominantColors,
    TextureFeatures,
    BrightnessContrast,
    HsvFeatures,
    ShapeFeatures,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::ColorHistogram,
        Channel::DominantColors,
        Channel::TextureFeatures,
        Channel::BrightnessContrast,
        Channel::HsvFeatures,
        Channel::ShapeFeatures,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::ColorHistogram => "colorHistogram",
            Channel::DominantColors => "dominantColors",
            Channel::TextureFeatures => "textureFeatures",
            Channel::BrightnessContrast => "brightnessContrast",
            Channel::HsvFeatures => "hsvFeatures",
            Channel::ShapeFeatures => "shapeFeatures",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
#[error("未知的特征通道: {0}")]
pub struct ParseChannelError(String);

impl FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseChannelError(s.to_owned()))
    }
}

/// 原始图片的基本信息，只用于诊断，不参与相似度计算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStats {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

/// 一张图片的全部特征，每个通道单独保存
///
/// 通道为空表示该特征不可用，计算相似度时会忽略该通道
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    pub color_histogram: Vec<f32>,
    pub dominant_colors: Vec<[f32; 3]>,
    pub texture_features: Vec<f32>,
    pub brightness_contrast: Vec<f32>,
    pub hsv_features: Vec<f32>,
    pub shape_features: Vec<f32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_stats: Option<ImageStats>,
}

impl FeatureRecord {
    /// 返回指定通道的特征向量，主色调会被展开为 `[r, g, b, r, g, b, ...]`
    pub fn channel(&self, channel: Channel) -> &[f32] {
        match channel {
            Channel::ColorHistogram => &self.color_histogram,
            Channel::DominantColors => self.dominant_colors.as_flattened(),
            Channel::TextureFeatures => &self.texture_features,
            Channel::BrightnessContrast => &self.brightness_contrast,
            Channel::HsvFeatures => &self.hsv_features,
            Channel::ShapeFeatures => &self.shape_features,
        }
    }

    /// 是否存在指定通道
    pub fn has(&self, channel: Channel) -> bool {
        !self.channel(channel).is_empty()
    }

    /// 所有通道均为空，通常意味着特征提取失败
    pub fn is_degraded(&self) -> bool {
        Channel::ALL.iter().all(|&c| !self.has(c))
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// 按通道顺序拼接所有特征，仅用于导出
    pub fn concat(&self) -> Vec<f32> {
        Channel::ALL.iter().flat_map(|&c| self.channel(c).iter().copied()).collect()
    }
}

/// 从已解码的像素网格提取全部特征
///
/// `large` 用于颜色直方图，`small` 用于其余特征
pub fn extract_grids(large: &PixelGrid, small: &PixelGrid, opts: &FeatureOptions) -> FeatureRecord {
    FeatureRecord {
        color_histogram: color_histogram(large, opts.histogram_bins),
        dominant_colors: dominant_colors(
            small,
            opts.cluster_count,
            opts.cluster_iterations,
            opts.cluster_seed,
        ),
        texture_features: texture_features(small),
        brightness_contrast: brightness_contrast(small),
        hsv_features: hsv_histogram(small),
        shape_features: shape_features(small),
        category: None,
        image_stats: None,
    }
}

/// 解码图片数据并提取全部特征
pub fn extract_features(bytes: &[u8], opts: &FeatureOptions) -> Result<FeatureRecord> {
    let image = decode_image(bytes)?;
    let (width, height) = image.dimensions();
    let large = PixelGrid::resize(&image, HISTOGRAM_SIZE, HISTOGRAM_SIZE);
    let small = PixelGrid::resize(&image, GRID_SIZE, GRID_SIZE);

    let mut record = extract_grids(&large, &small, opts);
    record.image_stats =
        Some(ImageStats { width, height, channels: image.color().channel_count() });
    Ok(record)
}
