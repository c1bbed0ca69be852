use thiserror::Error;

/// 特征提取与相似度计算过程中的错误
#[derive(Debug, Error)]
pub enum FeatureError {
    /// 图片数据无法解码，只影响当前这张图片
    #[error("无法解码图片: {0}")]
    Decode(#[from] image::ImageError),
    /// 获取图片数据失败
    #[error("获取图片失败 {url}: {reason}")]
    Fetch { url: String, reason: String },
    /// 获取图片数据超时
    #[error("获取图片超时: {0}")]
    Timeout(String),
    /// 两个向量长度不一致，计算相似度时会跳过该通道
    #[error("向量长度不一致: {0} != {1}")]
    DimensionMismatch(usize, usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = FeatureError> = std::result::Result<T, E>;
