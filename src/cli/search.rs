use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use log::debug;

use crate::CatalogDBBuilder;
use crate::catalog::SearchResult;
use crate::cli::SubCommandExtend;
use crate::config::{FeatureOptions, FetchOptions, Opts, RankOptions};
use crate::fetch::Fetcher;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    #[command(flatten)]
    pub rank: RankOptions,
    #[command(flatten)]
    pub fetch: FetchOptions,
    /// 被搜索的图片路径或 URL
    pub image: String,
    /// 查询图片所属的类别，同类别的商品会获得额外加分
    #[arg(long, value_name = "NAME")]
    pub category: Option<String>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let fetcher = Fetcher::new(self.fetch.timeout())?;
        let mut query = fetcher.fetch_features(&self.image, &self.feature).await?;
        query.category = self.category.clone();

        let db = CatalogDBBuilder::new(opts.conf_dir.clone())
            .scorer(self.rank.scorer())
            .policy(self.rank.policy())
            .open()
            .await?;
        if db.snapshot().await.is_empty() {
            bail!("商品库中没有商品，请先使用 add 或 seed 添加商品");
        }

        let result = db.search(&query).await;
        debug!("找到 {} 个相似商品", result.len());

        print_result(&result, self.output_format)
    }
}

fn print_result(result: &[SearchResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for item in result {
                println!("{:.3}\t{}\t{}", item.similarity, item.product.category, item.product.name);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}
