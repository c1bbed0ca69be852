use anyhow::Result;

use crate::catalog::ProductInfo;
use crate::features::FeatureRecord;

/// 商品记录
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRecord {
    /// 商品 ID
    pub id: i64,
    /// 图片 blake3 哈希
    pub hash: Option<Vec<u8>>,
    pub name: String,
    pub category: String,
    pub price: f64,
    /// 图片 URL 或本地路径
    pub image_url: String,
    pub description: String,
    /// bincode 编码的特征记录
    pub features: Option<Vec<u8>>,
    /// bincode 编码的旧版颜色向量
    pub legacy_color: Option<Vec<u8>>,
    /// 最后一次更新特征的时间戳
    pub updated_at: i64,
}

impl ProductRecord {
    pub fn info(&self) -> ProductInfo {
        ProductInfo {
            id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            price: self.price,
            image_url: self.image_url.clone(),
            description: self.description.clone(),
        }
    }

    /// 解码特征记录，特征的类别总是与商品类别保持一致
    pub fn decode_features(&self) -> Result<Option<FeatureRecord>> {
        let Some(bytes) = &self.features else {
            return Ok(None);
        };
        let record: FeatureRecord = bincode::deserialize(bytes)?;
        Ok(Some(record.with_category(self.category.clone())))
    }

    pub fn decode_legacy_color(&self) -> Result<Vec<f32>> {
        match &self.legacy_color {
            Some(bytes) => Ok(bincode::deserialize(bytes)?),
            None => Ok(vec![]),
        }
    }

}

/// 待添加的商品
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub hash: Option<Vec<u8>>,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub image_url: String,
    pub description: String,
    /// 提取失败时为 None
    pub features: Option<FeatureRecord>,
    pub legacy_color: Vec<f32>,
}

/// 编码特征记录，空记录保存为 NULL
pub fn encode_features(record: Option<&FeatureRecord>) -> Result<Option<Vec<u8>>> {
    match record {
        Some(record) if !record.is_degraded() => Ok(Some(bincode::serialize(record)?)),
        _ => Ok(None),
    }
}

pub fn encode_legacy_color(colors: &[f32]) -> Result<Option<Vec<u8>>> {
    if colors.is_empty() {
        return Ok(None);
    }
    Ok(Some(bincode::serialize(colors)?))
}
