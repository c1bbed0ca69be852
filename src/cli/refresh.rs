use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use indicatif::ProgressBar;
use log::info;

use crate::CatalogDBBuilder;
use crate::cli::SubCommandExtend;
use crate::config::{FeatureOptions, FetchOptions, Opts};
use crate::utils::pb_style;

/// 每次提交到数据库的更新数量
const BATCH_SIZE: usize = 64;

#[derive(Parser, Debug, Clone)]
pub struct RefreshCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    #[command(flatten)]
    pub fetch: FetchOptions,
    /// 重新提取所有商品的特征，默认只处理缺少特征的商品
    #[arg(long)]
    pub all: bool,
}

impl SubCommandExtend for RefreshCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = CatalogDBBuilder::new(opts.conf_dir.clone()).open().await?;
        let fetcher = crate::fetch::Fetcher::new(self.fetch.timeout())?;

        let products =
            if self.all { db.products().await? } else { db.degraded_products().await? };
        info!("需要重新提取特征的商品: {}", products.len());

        let pb = ProgressBar::new(products.len() as u64).with_style(pb_style());

        let mut tasks = futures::stream::iter(products)
            .map(|product| {
                let fetcher = &fetcher;
                async move {
                    let features = fetcher.fetch_features(&product.image_url, &self.feature).await;
                    (product, features)
                }
            })
            .buffer_unordered(self.fetch.fetch_concurrency.max(1));

        let (mut updated, mut failed) = (0, 0);
        let mut batch = vec![];
        while let Some((product, features)) = tasks.next().await {
            match features {
                Ok(features) if !features.is_degraded() => {
                    pb.set_message(product.name.clone());
                    batch.push((product.id, features));
                    updated += 1;
                }
                Ok(_) => failed += 1,
                Err(e) => {
                    // 保留原有特征
                    pb.println(format!("无法提取商品 {} 的特征: {}", product.name, e));
                    failed += 1;
                }
            }
            if batch.len() >= BATCH_SIZE {
                db.update_features(&batch).await?;
                batch.clear();
            }
            pb.inc(1);
        }
        db.update_features(&batch).await?;

        pb.finish_with_message("特征更新完成");
        info!("成功更新 {} 个商品，失败 {} 个", updated, failed);

        Ok(())
    }
}
