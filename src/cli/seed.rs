use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::ProgressBar;
use log::info;
use serde::Deserialize;

use crate::cli::SubCommandExtend;
use crate::config::{FeatureOptions, FetchOptions, Opts};
use crate::db::NewProduct;
use crate::fetch::{Fetcher, extract_blocking, is_remote};
use crate::utils::{hash_bytes, pb_style};
use crate::{CatalogDB, CatalogDBBuilder};

/// 商品清单中的一项
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedProduct {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub price: f64,
    /// 图片 URL，或相对于清单文件的本地路径
    pub image_url: String,
    #[serde(default)]
    pub description: String,
    /// 旧版本的颜色向量，没有多通道特征时用于计算相似度
    #[serde(default)]
    pub color_features: Vec<f32>,
}

/// 读取商品清单，支持 JSON 数组或 `{"products": [...]}`
pub fn read_manifest(path: &Path) -> Result<Vec<SeedProduct>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Manifest {
        List(Vec<SeedProduct>),
        Object { products: Vec<SeedProduct> },
    }

    let data = std::fs::read(path).with_context(|| format!("无法读取清单 {}", path.display()))?;
    let manifest: Manifest = serde_json::from_slice(&data)?;
    Ok(match manifest {
        Manifest::List(products) | Manifest::Object { products } => products,
    })
}

/// 将清单中的本地相对路径转换为相对于清单所在目录的路径
fn resolve_source(manifest: &Path, image_url: &str) -> String {
    if is_remote(image_url) || Path::new(image_url).is_absolute() {
        return image_url.to_owned();
    }
    let base = manifest.parent().unwrap_or(Path::new(""));
    base.join(image_url).to_string_lossy().into_owned()
}

#[derive(Parser, Debug, Clone)]
pub struct SeedCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    #[command(flatten)]
    pub fetch: FetchOptions,
    /// 商品清单文件
    pub manifest: PathBuf,
}

impl SubCommandExtend for SeedCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let products = read_manifest(&self.manifest)?;
        info!("清单中共有 {} 个商品", products.len());

        let db = CatalogDBBuilder::new(opts.conf_dir.clone()).open().await?;
        let fetcher = Fetcher::new(self.fetch.timeout())?;

        let pb = ProgressBar::new(products.len() as u64).with_style(pb_style());

        let mut tasks = futures::stream::iter(products)
            .map(|product| {
                let source = resolve_source(&self.manifest, &product.image_url);
                let fetcher = &fetcher;
                async move {
                    let data = fetcher.fetch(&source).await;
                    (product, source, data)
                }
            })
            .buffered(self.fetch.fetch_concurrency.max(1));

        let (mut added, mut degraded) = (0, 0);
        while let Some((product, source, data)) = tasks.next().await {
            let hash = match &data {
                Ok(data) => Some(hash_bytes(data)),
                Err(_) => None,
            };
            if let Some(hash) = &hash {
                if db.check_hash(hash).await? {
                    pb.set_message(format!("跳过已添加商品: {}", product.name));
                    pb.inc(1);
                    continue;
                }
            }

            let features = match data {
                Ok(data) => extract_blocking(data, self.feature.clone()).await,
                Err(e) => Err(e),
            };
            let features = match features {
                Ok(features) => Some(features),
                Err(e) => {
                    pb.println(format!("无法提取商品 {} 的特征 {}: {}", product.name, source, e));
                    degraded += 1;
                    None
                }
            };

            add_product(&db, product, source, hash, features).await?;
            added += 1;
            pb.inc(1);
        }

        pb.finish_with_message("商品导入完成");
        info!("新增 {} 个商品，其中 {} 个缺少特征", added, degraded);

        Ok(())
    }
}

async fn add_product(
    db: &CatalogDB,
    product: SeedProduct,
    source: String,
    hash: Option<Vec<u8>>,
    features: Option<crate::features::FeatureRecord>,
) -> Result<i64> {
    db.add_product(&NewProduct {
        hash,
        name: product.name,
        category: product.category,
        price: product.price,
        image_url: source,
        description: product.description,
        features,
        legacy_color: product.color_features,
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "Red Sneaker", "category": "Shoes", "price": 59.9,
                 "imageUrl": "images/red.png", "description": "running shoe"},
                {"name": "Lamp", "category": "Home", "imageUrl": "https://example.com/lamp.jpg",
                 "colorFeatures": [0.1, 0.9]}
            ]"#,
        )
        .unwrap();

        let products = read_manifest(&path).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].price, 59.9);
        assert_eq!(products[1].price, 0.0);
        assert_eq!(products[1].color_features, vec![0.1, 0.9]);

        std::fs::write(&path, r#"{"products": [{"name": "a", "category": "b", "imageUrl": "c"}]}"#)
            .unwrap();
        assert_eq!(read_manifest(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_source() {
        let manifest = Path::new("/data/seed/products.json");
        assert_eq!(resolve_source(manifest, "images/red.png"), "/data/seed/images/red.png");
        assert_eq!(resolve_source(manifest, "/abs/red.png"), "/abs/red.png");
        assert_eq!(
            resolve_source(manifest, "https://example.com/a.jpg"),
            "https://example.com/a.jpg"
        );
    }
}
