use rstest::*;
use vismatch::catalog::{CatalogEntry, ProductInfo};
use vismatch::features::FeatureRecord;
use vismatch::rank::{RankPolicy, rank};
use vismatch::similarity::Scorer;

/// 与查询向量 `[1, 0]` 的余弦相似度恰好为 `similarity` 的旧版颜色向量
fn entry(id: i64, category: &str, similarity: f32) -> CatalogEntry {
    CatalogEntry {
        info: ProductInfo {
            id,
            name: format!("{category}-{similarity}"),
            category: category.to_owned(),
            price: 1.0,
            image_url: format!("{id}.jpg"),
            description: String::new(),
        },
        features: None,
        legacy_color: vec![similarity, (1.0 - similarity * similarity).sqrt()],
    }
}

fn query() -> FeatureRecord {
    FeatureRecord { color_histogram: vec![1.0, 0.0], ..Default::default() }
}

#[fixture]
fn catalog() -> Vec<CatalogEntry> {
    vec![
        entry(1, "Electronics", 0.9),
        entry(2, "Electronics", 0.8),
        entry(3, "Electronics", 0.7),
        entry(4, "Electronics", 0.6),
        entry(5, "Shoes", 0.95),
        entry(6, "Home", 0.5),
    ]
}

#[rstest]
fn diversified_top_five(catalog: Vec<CatalogEntry>) {
    let policy = RankPolicy { limit: 5, ..Default::default() };
    let result = rank(&query(), &catalog, &Scorer::default(), &policy);

    let ids = result.iter().map(|m| m.entry.info.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![5, 1, 2, 3, 6]);
    assert!(result.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    assert!(result.iter().all(|m| !m.to_result().enhanced_match));
}

#[rstest]
#[case::one_per_category(1, 10, vec![5, 1, 6])]
#[case::two_per_category(2, 10, vec![5, 1, 2, 6])]
#[case::default_cap(3, 10, vec![5, 1, 2, 3, 6])]
#[case::unlimited(10, 10, vec![5, 1, 2, 3, 4, 6])]
#[case::limit_before_cap(10, 2, vec![5, 1])]
#[case::zero_cap(0, 10, vec![])]
fn per_category_cap(
    catalog: Vec<CatalogEntry>,
    #[case] max_per_category: usize,
    #[case] limit: usize,
    #[case] expected: Vec<i64>,
) {
    let policy = RankPolicy { max_per_category, limit, ..Default::default() };
    let result = rank(&query(), &catalog, &Scorer::default(), &policy);
    let ids = result.iter().map(|m| m.entry.info.id).collect::<Vec<_>>();
    assert_eq!(ids, expected);
}

#[rstest]
#[case::default_floor(0.05, 6)]
#[case::mid_floor(0.65, 4)]
#[case::high_floor(0.99, 0)]
fn noise_floor_filters_weak_matches(catalog: Vec<CatalogEntry>, #[case] noise_floor: f32, #[case] count: usize) {
    let policy = RankPolicy { noise_floor, max_per_category: 10, limit: 10 };
    let result = rank(&query(), &catalog, &Scorer::default(), &policy);
    assert_eq!(result.len(), count);
    assert!(result.iter().all(|m| m.similarity > noise_floor));
}

#[test]
fn products_without_features_never_match() {
    let mut catalog = vec![entry(1, "Shoes", 0.9)];
    catalog.push(CatalogEntry { legacy_color: vec![], ..entry(2, "Shoes", 0.9) });

    let result = rank(&query(), &catalog, &Scorer::default(), &RankPolicy::default());
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].entry.info.id, 1);
}

#[test]
fn enhanced_entries_are_flagged() {
    let record = FeatureRecord {
        color_histogram: vec![1.0, 0.0],
        shape_features: vec![0.3, 0.4],
        category: Some("Shoes".to_owned()),
        ..Default::default()
    };
    let catalog = vec![
        CatalogEntry { features: Some(record.clone()), ..entry(1, "Shoes", 0.2) },
        entry(2, "Shoes", 0.9),
    ];

    let result = rank(&record, &catalog, &Scorer::default(), &RankPolicy::default());
    assert_eq!(result.len(), 2);
    // 多通道特征完全一致，并获得类别加分
    assert_eq!(result[0].entry.info.id, 1);
    assert!((result[0].similarity - 1.1).abs() < 1e-5);
    assert!(result[0].to_result().enhanced_match);
    assert!(!result[1].to_result().enhanced_match);
}
