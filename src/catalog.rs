use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::features::FeatureRecord;
use crate::similarity::CandidateFeatures;

/// 商品的展示信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: f64,
    /// 商品图片的 URL 或本地路径
    pub image_url: String,
    #[serde(default)]
    pub description: String,
}

/// 商品库中的一个条目，包含预先计算好的图片特征
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub info: ProductInfo,
    pub features: Option<FeatureRecord>,
    /// 旧版本保存的扁平颜色向量
    pub legacy_color: Vec<f32>,
}

impl CatalogEntry {
    pub fn new(info: ProductInfo, features: Option<FeatureRecord>) -> Self {
        Self { info, features, legacy_color: vec![] }
    }

    pub fn category(&self) -> &str {
        &self.info.category
    }

    pub fn candidate(&self) -> CandidateFeatures<'_> {
        CandidateFeatures::select(self.features.as_ref(), &self.legacy_color)
    }

    /// 是否拥有可用的多通道特征
    pub fn is_enhanced(&self) -> bool {
        matches!(self.candidate(), CandidateFeatures::Enhanced(_))
    }
}

/// 商品库快照，创建后不再修改
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<CatalogEntry> for Catalog {
    fn from_iter<T: IntoIterator<Item = CatalogEntry>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// 一条搜索结果
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub product: ProductInfo,
    pub similarity: f32,
    /// 是否使用多通道特征计算的相似度
    pub enhanced_match: bool,
}
