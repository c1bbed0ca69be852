use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vismatch::catalog::{CatalogEntry, ProductInfo};
use vismatch::features::FeatureRecord;
use vismatch::rank::{RankPolicy, rank};
use vismatch::similarity::Scorer;

const CATEGORIES: [&str; 8] =
    ["Shoes", "Electronics", "Home", "Toys", "Books", "Sports", "Beauty", "Garden"];

fn random_vec(rng: &mut StdRng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.random::<f32>()).collect()
}

// 与真实特征长度一致的随机特征
fn random_record(rng: &mut StdRng) -> FeatureRecord {
    FeatureRecord {
        color_histogram: random_vec(rng, 4096),
        dominant_colors: (0..5).map(|_| rng.random()).collect(),
        texture_features: random_vec(rng, 11),
        brightness_contrast: random_vec(rng, 12),
        hsv_features: random_vec(rng, 56),
        shape_features: random_vec(rng, 10),
        category: None,
        image_stats: None,
    }
}

fn generate_catalog(n: usize) -> Vec<CatalogEntry> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|i| {
            let category = CATEGORIES[i % CATEGORIES.len()];
            let info = ProductInfo {
                id: i as i64,
                name: format!("product-{i}"),
                category: category.to_owned(),
                price: rng.random_range(1.0..500.0),
                image_url: format!("{i}.jpg"),
                description: String::new(),
            };
            CatalogEntry::new(info, Some(random_record(&mut rng).with_category(category)))
        })
        .collect()
}

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");
    let scorer = Scorer::default();
    let policy = RankPolicy::default();
    let query = random_record(&mut StdRng::seed_from_u64(7)).with_category("Shoes");

    for n in [100, 1000, 10000] {
        let catalog = black_box(generate_catalog(n));
        group.bench_function(format!("rank_{n}"), |b| {
            b.iter(|| rank(&query, &catalog, &scorer, &policy).len())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
