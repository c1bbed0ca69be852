use crate::features::FeatureRecord;

/// 扫描得到的图片，读取失败时 `data` 为 None
pub struct ImageData {
    pub path: String,
    pub data: Option<Vec<u8>>,
}

/// 无法读取的图片没有哈希
pub struct HashedImageData {
    pub path: String,
    pub data: Option<Vec<u8>>,
    pub hash: Option<Vec<u8>>,
}

/// 已提取特征的图片，读取或提取失败时 `features` 为 None
pub struct ProcessedImage {
    pub path: String,
    pub hash: Option<Vec<u8>>,
    pub features: Option<FeatureRecord>,
}
