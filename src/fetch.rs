use std::time::Duration;

use log::warn;
use reqwest::Client;
use tokio::task::spawn_blocking;

use crate::FeatureOptions;
use crate::error::{FeatureError, Result};
use crate::features::{FeatureRecord, extract_features};

const USER_AGENT: &str = concat!("Mozilla/5.0 (compatible; vismatch/", env!("CARGO_PKG_VERSION"), ")");

/// 图片来源：HTTP(S) URL 或本地文件路径
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// 读取图片数据，所有请求都带有超时
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeatureError::Fetch { url: String::new(), reason: e.to_string() })?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 获取图片的原始数据
    pub async fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        if is_remote(source) {
            self.fetch_url(source).await
        } else {
            match tokio::time::timeout(self.timeout, tokio::fs::read(source)).await {
                Ok(data) => Ok(data?),
                Err(_) => Err(FeatureError::Timeout(source.to_owned())),
            }
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FeatureError::Timeout(url.to_owned())
            } else {
                FeatureError::Fetch { url: url.to_owned(), reason: e.to_string() }
            }
        };
        let response = self.client.get(url).send().await.map_err(map_err)?;
        let response = response.error_for_status().map_err(map_err)?;
        let bytes = response.bytes().await.map_err(map_err)?;
        Ok(bytes.to_vec())
    }

    /// 获取图片并提取特征
    pub async fn fetch_features(&self, source: &str, opts: &FeatureOptions) -> Result<FeatureRecord> {
        let data = self.fetch(source).await?;
        extract_blocking(data, opts.clone()).await
    }

    /// 获取图片并提取特征，失败时返回空的特征记录而不是错误
    pub async fn fetch_features_or_degraded(&self, source: &str, opts: &FeatureOptions) -> FeatureRecord {
        match self.fetch_features(source, opts).await {
            Ok(record) => record,
            Err(e) => {
                warn!("提取特征失败，使用空特征代替 {}: {}", source, e);
                FeatureRecord::default()
            }
        }
    }
}

/// 在阻塞线程池中提取特征
pub async fn extract_blocking(data: Vec<u8>, opts: FeatureOptions) -> Result<FeatureRecord> {
    spawn_blocking(move || extract_features(&data, &opts))
        .await
        .map_err(|e| FeatureError::Io(std::io::Error::other(e)))?
}
