use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::features::{Channel, FeatureRecord};

/// 计算两个向量的余弦相似度，长度不一致时返回错误，任一向量为零向量时返回 0
pub fn try_cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(FeatureError::DimensionMismatch(a.len(), b.len()));
    }
    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// 计算两个向量的余弦相似度，长度不一致或存在零向量时返回 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    try_cosine_similarity(a, b).unwrap_or(0.0)
}

/// 各特征通道的权重
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weights {
    pub color_histogram: f32,
    pub dominant_colors: f32,
    pub texture_features: f32,
    pub brightness_contrast: f32,
    pub hsv_features: f32,
    pub shape_features: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            color_histogram: 0.25,
            dominant_colors: 0.20,
            texture_features: 0.15,
            brightness_contrast: 0.15,
            hsv_features: 0.15,
            shape_features: 0.10,
        }
    }
}

impl Weights {
    pub fn get(&self, channel: Channel) -> f32 {
        match channel {
            Channel::ColorHistogram => self.color_histogram,
            Channel::DominantColors => self.dominant_colors,
            Channel::TextureFeatures => self.texture_features,
            Channel::BrightnessContrast => self.brightness_contrast,
            Channel::HsvFeatures => self.hsv_features,
            Channel::ShapeFeatures => self.shape_features,
        }
    }

    pub fn set(&mut self, channel: Channel, weight: f32) {
        let slot = match channel {
            Channel::ColorHistogram => &mut self.color_histogram,
            Channel::DominantColors => &mut self.dominant_colors,
            Channel::TextureFeatures => &mut self.texture_features,
            Channel::BrightnessContrast => &mut self.brightness_contrast,
            Channel::HsvFeatures => &mut self.hsv_features,
            Channel::ShapeFeatures => &mut self.shape_features,
        };
        *slot = weight;
    }
}

/// 候选商品可用的特征，决定使用哪种方式计算相似度
#[derive(Debug, Clone, Copy)]
pub enum CandidateFeatures<'a> {
    /// 完整的多通道特征
    Enhanced(&'a FeatureRecord),
    /// 旧版本的单一颜色向量
    Legacy(&'a [f32]),
    /// 没有可用特征
    Absent,
}

impl<'a> CandidateFeatures<'a> {
    /// 优先使用多通道特征，其次使用旧版颜色向量
    pub fn select(record: Option<&'a FeatureRecord>, legacy: &'a [f32]) -> Self {
        match record {
            Some(record) if !record.is_degraded() => Self::Enhanced(record),
            _ if !legacy.is_empty() => Self::Legacy(legacy),
            _ => Self::Absent,
        }
    }
}

/// 单个通道的比较结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelScore {
    pub channel: Channel,
    pub weight: f32,
    /// 任一方缺少该通道或长度不一致时为 None
    pub similarity: Option<f32>,
}

/// 加权相似度计算
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scorer {
    weights: Weights,
    category_bonus: f32,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(Weights::default(), 0.10)
    }
}

impl Scorer {
    pub fn new(weights: Weights, category_bonus: f32) -> Self {
        Self { weights, category_bonus }
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// 逐通道比较两条特征记录
    pub fn channel_scores(&self, query: &FeatureRecord, candidate: &FeatureRecord) -> Vec<ChannelScore> {
        Channel::ALL
            .iter()
            .map(|&channel| {
                let (a, b) = (query.channel(channel), candidate.channel(channel));
                let similarity = if a.is_empty() || b.is_empty() {
                    None
                } else {
                    try_cosine_similarity(a, b).ok()
                };
                ChannelScore { channel, weight: self.weights.get(channel), similarity }
            })
            .collect()
    }

    /// 两条特征记录的加权相似度
    ///
    /// 只有双方都具备的通道参与计算，结果按实际使用的权重归一化，
    /// 类别相同时再加上固定的奖励分
    pub fn score_records(&self, query: &FeatureRecord, candidate: &FeatureRecord) -> f32 {
        let (mut total, mut total_weight) = (0f32, 0f32);
        for score in self.channel_scores(query, candidate) {
            if let Some(similarity) = score.similarity {
                total += similarity * score.weight;
                total_weight += score.weight;
            }
        }
        if total_weight <= 0.0 {
            return 0.0;
        }

        let bonus = match (&query.category, &candidate.category) {
            (Some(a), Some(b)) if a == b => self.category_bonus,
            _ => 0.0,
        };
        total / total_weight + bonus
    }

    /// 根据候选商品可用的特征计算相似度
    pub fn score(&self, query: &FeatureRecord, candidate: CandidateFeatures<'_>) -> f32 {
        match candidate {
            CandidateFeatures::Enhanced(record) => self.score_records(query, record),
            CandidateFeatures::Legacy(colors) => cosine_similarity(&query.color_histogram, colors),
            CandidateFeatures::Absent => 0.0,
        }
    }
}
