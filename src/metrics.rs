use std::sync::LazyLock;

use prometheus::*;

static METRIC_SEARCH_IMAGE_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "vismatch_search_image_count",
        "count of the query images",
        &["size", "source"]
    )
    .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "vismatch_search_duration",
        "duration of the per-image feature extraction and ranking in seconds",
        &["size", "source"]
    )
    .unwrap()
});

static METRIC_SEARCH_TOP_SCORE: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "vismatch_search_top_score",
        "similarity of the best match of the per-image search",
        &["size", "source"],
        (1..=22).map(|x| x as f64 * 0.05).collect()
    )
    .unwrap()
});

static METRIC_CATALOG_SIZE: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("vismatch_catalog_size", "number of products in the catalog snapshot")
        .unwrap()
});

/// 查询图片的来源
#[derive(Debug, Clone, Copy)]
pub enum QuerySource {
    Upload,
    Url,
}

impl QuerySource {
    fn as_str(&self) -> &'static str {
        match self {
            QuerySource::Upload => "upload",
            QuerySource::Url => "url",
        }
    }
}

/// 记录一次搜索
pub fn observe_search(size: (u32, u32), source: QuerySource, duration: f32, top_score: Option<f32>) {
    let labels = [to_fixed_size(size), source.as_str()];

    METRIC_SEARCH_IMAGE_COUNT.with_label_values(&labels).inc();
    METRIC_SEARCH_DURATION.with_label_values(&labels).observe(duration as f64);
    // 没有结果时记为 0 分
    METRIC_SEARCH_TOP_SCORE.with_label_values(&labels).observe(top_score.unwrap_or(0.0) as f64);
}

pub fn set_catalog_size(size: usize) {
    METRIC_CATALOG_SIZE.set(size as i64);
}

/// 将图像面积范围调整到几个固定值
fn to_fixed_size((width, height): (u32, u32)) -> &'static str {
    let area = width as u64 * height as u64;
    [128u64, 256, 512, 1024, 2048]
        .into_iter()
        .find(|&side| area <= side * side)
        .map(|side| match side {
            128 => "128",
            256 => "256",
            512 => "512",
            1024 => "1024",
            _ => "2048",
        })
        .unwrap_or("2048+")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_fixed_size() {
        assert_eq!(to_fixed_size((64, 64)), "128");
        assert_eq!(to_fixed_size((300, 200)), "256");
        assert_eq!(to_fixed_size((1920, 1080)), "2048");
        assert_eq!(to_fixed_size((4096, 4096)), "2048+");
        assert_eq!(to_fixed_size((u32::MAX, u32::MAX)), "2048+");
    }
}
