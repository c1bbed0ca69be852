use std::path::Path;

use indicatif::ProgressStyle;

/// 默认的进度条样式
pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .expect("invalid progress template")
        .progress_chars("#>-")
}

/// 无法预知总数时使用的进度条样式，显示处理速度
pub fn pb_style_speed() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {pos} ({per_sec}) {msg}")
        .expect("invalid progress template")
}

/// 计算图片数据的 blake3 哈希
pub fn hash_bytes(data: &[u8]) -> Vec<u8> {
    blake3::hash(data).as_bytes().to_vec()
}

/// 小写十六进制编码
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// 商品名称取文件名（不含扩展名），商品类别取所在目录名
pub fn name_and_category(path: &str) -> (String, Option<String>) {
    let path = Path::new(path);
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    let category = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy().into_owned());
    (name, category)
}
