use std::collections::HashMap;

use rayon::prelude::*;

use crate::catalog::{CatalogEntry, SearchResult};
use crate::features::FeatureRecord;
use crate::similarity::Scorer;

/// 排序策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankPolicy {
    /// 相似度不超过该值的结果会被丢弃
    pub noise_floor: f32,
    /// 每个类别最多保留的结果数量
    pub max_per_category: usize,
    /// 最终返回的结果数量
    pub limit: usize,
}

impl Default for RankPolicy {
    fn default() -> Self {
        Self { noise_floor: 0.05, max_per_category: 3, limit: 10 }
    }
}

/// 一个匹配到的商品
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub entry: &'a CatalogEntry,
    pub similarity: f32,
}

impl Match<'_> {
    pub fn to_result(&self) -> SearchResult {
        SearchResult {
            product: self.entry.info.clone(),
            similarity: self.similarity,
            enhanced_match: self.entry.is_enhanced(),
        }
    }
}

fn sort_desc(matches: &mut [Match<'_>]) {
    // 稳定排序，相似度相同时保持商品库中的顺序
    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
}

/// 计算查询特征与商品库中每个商品的相似度，返回多样化后的排序结果
///
/// 1. 丢弃相似度不超过 `noise_floor` 的商品
/// 2. 按相似度降序排列
/// 3. 按类别分组，每组最多保留 `max_per_category` 个
/// 4. 合并后重新排序，截取前 `limit` 个
pub fn rank<'a>(
    query: &FeatureRecord,
    catalog: &'a [CatalogEntry],
    scorer: &Scorer,
    policy: &RankPolicy,
) -> Vec<Match<'a>> {
    if catalog.is_empty() || policy.limit == 0 {
        return vec![];
    }

    let mut scored = catalog
        .par_iter()
        .map(|entry| Match { entry, similarity: scorer.score(query, entry.candidate()) })
        .filter(|m| m.similarity > policy.noise_floor)
        .collect::<Vec<_>>();
    sort_desc(&mut scored);

    // 按类别首次出现的顺序分组
    let mut order = vec![];
    let mut groups: HashMap<&str, Vec<Match<'a>>> = HashMap::new();
    for m in scored {
        let group = groups.entry(m.entry.category()).or_insert_with(|| {
            order.push(m.entry.category());
            vec![]
        });
        if group.len() < policy.max_per_category {
            group.push(m);
        }
    }

    let mut result = order
        .into_iter()
        .flat_map(|c| groups.remove(c).unwrap_or_default())
        .collect::<Vec<_>>();
    sort_desc(&mut result);
    result.truncate(policy.limit);
    result
}
