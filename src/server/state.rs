use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::CatalogDB;
use crate::cli::server::ServerCommand;
use crate::config::{FeatureOptions, RankOptions};
use crate::fetch::Fetcher;
use crate::metrics;
use crate::utils::to_hex;

/// 应用状态
pub struct AppState {
    /// 商品数据库与搜索快照
    pub db: CatalogDB,
    /// 下载查询图片
    pub fetcher: Fetcher,
    /// 特征提取参数
    pub feature: FeatureOptions,
    /// 默认的排序参数
    pub rank: RankOptions,
    /// 鉴权 token
    pub token: String,
    /// 上传图片的保存目录
    pub upload_dir: PathBuf,
}

impl AppState {
    /// 创建新的应用状态
    pub async fn new(
        db: CatalogDB,
        fetcher: Fetcher,
        opts: ServerCommand,
        upload_dir: PathBuf,
    ) -> Arc<Self> {
        metrics::set_catalog_size(db.snapshot().await.len());
        Arc::new(AppState {
            db,
            fetcher,
            feature: opts.feature,
            rank: opts.rank,
            token: opts.token,
            upload_dir,
        })
    }

    /// 检查请求携带的 token
    pub fn authorized(&self, token: &str) -> bool {
        !self.token.is_empty() && self.token == token
    }

    /// 上传图片的保存路径，以图片哈希命名，保留原始扩展名
    pub fn upload_path(&self, hash: &[u8], file_name: &str) -> PathBuf {
        let ext = Path::new(file_name).extension().and_then(|e| e.to_str()).unwrap_or("bin");
        self.upload_dir.join(format!("{}.{}", to_hex(hash), ext))
    }
}
