use std::io::Cursor;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vismatch::FeatureOptions;
use vismatch::decoder::PixelGrid;
use vismatch::features::{
    color_histogram, dominant_colors, extract_features, hsv_histogram, shape_features, texture_features,
};

// 带有色块的测试图片，比纯噪声更接近商品图
fn generate_image(width: u32, height: u32) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(42);
    let palette: Vec<[u8; 3]> = (0..6).map(|_| rng.random()).collect();
    RgbImage::from_fn(width, height, |x, y| {
        let base = palette[((x / 32 + y / 32) % 6) as usize];
        Rgb(base.map(|c| c.saturating_add(rng.random::<u8>() & 0x0F)))
    })
}

fn bench_channels(c: &mut Criterion) {
    let mut group = c.benchmark_group("channels");
    let image = DynamicImage::ImageRgb8(generate_image(640, 480));
    let large = PixelGrid::resize(&image, 128, 128);
    let small = PixelGrid::resize(&image, 64, 64);

    group.bench_function("color_histogram", |b| b.iter(|| color_histogram(black_box(&large), 16)));
    group.bench_function("dominant_colors", |b| b.iter(|| dominant_colors(black_box(&small), 5, 10, 42)));
    group.bench_function("texture_features", |b| b.iter(|| texture_features(black_box(&small))));
    group.bench_function("hsv_histogram", |b| b.iter(|| hsv_histogram(black_box(&small))));
    group.bench_function("shape_features", |b| b.iter(|| shape_features(black_box(&small))));

    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    let opts = FeatureOptions::default();

    for (width, height) in [(256, 256), (800, 600), (1920, 1080)] {
        let mut buf = Cursor::new(vec![]);
        DynamicImage::ImageRgb8(generate_image(width, height))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        let data = buf.into_inner();

        group.bench_function(format!("png_{width}x{height}"), |b| {
            b.iter(|| extract_features(black_box(&data), &opts).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_channels, bench_extract);
criterion_main!(benches);
