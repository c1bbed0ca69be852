use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::*;
use vismatch::FeatureOptions;
use vismatch::catalog::{CatalogEntry, ProductInfo};
use vismatch::error::FeatureError;
use vismatch::features::{Channel, extract_features};
use vismatch::rank::{RankPolicy, rank};
use vismatch::similarity::Scorer;

fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(vec![]);
    DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn noise(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbImage::from_fn(width, height, |_, _| Rgb(rng.random()))
}

#[test]
fn solid_red() {
    let data = encode(RgbImage::from_pixel(200, 150, Rgb([255, 0, 0])), ImageFormat::Png);
    let record = extract_features(&data, &FeatureOptions::default()).unwrap();

    let lengths = Channel::ALL.map(|c| record.channel(c).len());
    assert_eq!(lengths, [4096, 15, 11, 12, 56, 10]);

    assert_eq!(record.color_histogram[15 * 16 * 16], 1.0);
    assert_eq!(record.dominant_colors, vec![[1.0, 0.0, 0.0]; 5]);
    // 色相桶 0，饱和度与明度均在最后一个桶
    assert_eq!(record.hsv_features[0], 1.0);
    assert_eq!(record.hsv_features[36 + 9], 1.0);
    assert_eq!(record.hsv_features[46 + 9], 1.0);
    assert_eq!(record.brightness_contrast[..4], [1.0, 0.0, 1.0, 1.0]);

    let stats = record.image_stats.unwrap();
    assert_eq!((stats.width, stats.height, stats.channels), (200, 150, 3));
    assert_eq!(record.category, None);
}

#[test]
fn deterministic() {
    let data = encode(noise(97, 61, 7), ImageFormat::Png);
    let opts = FeatureOptions::default();
    let a = extract_features(&data, &opts).unwrap();
    let b = extract_features(&data, &opts).unwrap();
    assert_eq!(a, b);
}

#[rstest]
#[case::single_pixel(1, 1)]
#[case::tall(17, 300)]
#[case::vga(640, 480)]
fn histograms_are_normalized(#[case] width: u32, #[case] height: u32) {
    let data = encode(noise(width, height, 42), ImageFormat::Png);
    let record = extract_features(&data, &FeatureOptions::default()).unwrap();

    let sum = record.color_histogram.iter().sum::<f32>();
    assert!((sum - 1.0).abs() < 1e-4, "sum = {sum}");

    // 色相、饱和度、明度三个直方图分别归一化
    for part in [&record.hsv_features[..36], &record.hsv_features[36..46], &record.hsv_features[46..]] {
        assert!((part.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }
    assert!((record.shape_features[2..].iter().sum::<f32>() - 1.0).abs() < 1e-4);
}

#[rstest]
#[case::png(ImageFormat::Png)]
#[case::bmp(ImageFormat::Bmp)]
fn lossless_formats_agree(#[case] format: ImageFormat) {
    let img = noise(80, 80, 3);
    let opts = FeatureOptions::default();
    let expected = extract_features(&encode(img.clone(), ImageFormat::Png), &opts).unwrap();
    let record = extract_features(&encode(img, format), &opts).unwrap();
    assert_eq!(record.color_histogram, expected.color_histogram);
    assert_eq!(record.shape_features, expected.shape_features);
}

#[test]
fn similar_images_score_higher() {
    let opts = FeatureOptions::default();
    let scorer = Scorer::default();

    let red = extract_features(
        &encode(RgbImage::from_pixel(64, 64, Rgb([230, 20, 20])), ImageFormat::Png),
        &opts,
    )
    .unwrap();
    let darker_red = extract_features(
        &encode(RgbImage::from_pixel(64, 64, Rgb([200, 10, 10])), ImageFormat::Png),
        &opts,
    )
    .unwrap();
    let blue = extract_features(
        &encode(RgbImage::from_pixel(64, 64, Rgb([20, 20, 230])), ImageFormat::Png),
        &opts,
    )
    .unwrap();

    let textured = extract_features(&encode(noise(64, 64, 9), ImageFormat::Png), &opts).unwrap();
    assert!((scorer.score_records(&textured, &textured) - 1.0).abs() < 1e-5);
    assert!(scorer.score_records(&red, &darker_red) > scorer.score_records(&red, &blue));
}

fn entry(id: i64, category: &str, img: RgbImage) -> CatalogEntry {
    let record = extract_features(&encode(img, ImageFormat::Png), &FeatureOptions::default())
        .unwrap()
        .with_category(category);
    let info = ProductInfo {
        id,
        name: format!("product-{id}"),
        category: category.to_owned(),
        price: 1.0,
        image_url: format!("{id}.png"),
        description: String::new(),
    };
    CatalogEntry::new(info, Some(record))
}

#[test]
fn self_similarity_is_maximal_within_category() {
    let scorer = Scorer::default();
    let query_image = noise(64, 64, 100);
    let query = extract_features(&encode(query_image.clone(), ImageFormat::Png), &FeatureOptions::default())
        .unwrap()
        .with_category("Shoes");

    let mut catalog = vec![entry(0, "Shoes", query_image.clone())];
    for seed in 1..6 {
        catalog.push(entry(seed, "Shoes", noise(64, 64, seed as u64)));
    }
    catalog.push(entry(6, "Shoes", RgbImage::from_pixel(64, 64, Rgb([200, 40, 40]))));
    catalog.push(entry(7, "Home", query_image));
    catalog.push(entry(8, "Home", noise(64, 64, 200)));

    let own = scorer.score(&query, catalog[0].candidate());
    for candidate in &catalog[1..] {
        let score = scorer.score(&query, candidate.candidate());
        if candidate.category() == "Shoes" {
            assert!(own + 1e-6 >= score, "{} > {}", score, own);
        } else {
            // 图片相同但类别不同时没有类别加分
            assert!(own > score, "{} >= {}", score, own);
        }
    }

    let policy = RankPolicy { noise_floor: 0.0, max_per_category: 10, limit: 10 };
    let result = rank(&query, &catalog, &scorer, &policy);
    assert_eq!(result[0].entry.info.id, 0);
}

#[rstest]
#[case::empty(b"")]
#[case::garbage(b"definitely not an image")]
#[case::truncated_png(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR")]
fn invalid_images(#[case] data: &[u8]) {
    let err = extract_features(data, &FeatureOptions::default()).unwrap_err();
    assert!(matches!(err, FeatureError::Decode(_)));
}
