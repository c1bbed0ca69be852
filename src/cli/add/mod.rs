use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use indicatif::ProgressBar;
use log::info;
use regex::Regex;
use tasks::*;

mod tasks;
mod types;

use crate::CatalogDBBuilder;
use crate::cli::SubCommandExtend;
use crate::config::{FeatureOptions, Opts};
use crate::utils::pb_style_speed;

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    /// 图片所在目录，也支持扫描 tar 归档文件
    /// 商品类别默认取图片所在的目录名，商品名称取文件名
    /// 归档中的图片以归档内的路径作为图片地址，需要配合 --replace 才能被 refresh 重新读取
    #[arg(verbatim_doc_comment)]
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png,webp,gif,bmp")]
    pub suffix: String,
    /// 在添加到数据库之前使用正则表达式对图片路径进行处理
    /// 例：--replace '/path/to/image/(?<name>[0-9]+).jpg' 'https://cdn.example.com/$name.jpg'
    #[arg(short, long, value_names = ["REGEX", "REPLACE"], num_args = 2, verbatim_doc_comment)]
    pub replace: Vec<String>,
    /// 为所有图片指定商品类别
    #[arg(long, value_name = "NAME")]
    pub category: Option<String>,
    /// 商品价格
    #[arg(long, default_value_t = 0.0)]
    pub price: f64,
    /// 如果图片已添加，是否覆盖旧的图片地址
    #[arg(long)]
    pub overwrite: bool,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let re_suf = Regex::new(&format!("(?i)^({})$", self.suffix.replace(',', "|")))?;
        let replace = match self.replace.as_slice() {
            [re, replace] => Some((Regex::new(re)?, replace.clone())),
            _ => None,
        };
        let settings = AddSettings {
            overwrite: self.overwrite,
            replace,
            category: self.category.clone(),
            price: self.price,
            archive: self.path.is_file(),
        };

        let db = Arc::new(CatalogDBBuilder::new(opts.conf_dir.clone()).open().await?);

        let pb = ProgressBar::no_length().with_style(pb_style_speed());

        let (t1, rx) = task_scan(self.path.clone(), pb.clone(), re_suf);
        let (t2, rx) = task_hash(rx);
        let (t3, rx) = task_filter(rx, pb.clone(), db.clone(), settings.clone());
        let (t4, rx) = task_calc(rx, pb.clone(), self.feature.clone());
        let t5 = task_add(rx, pb.clone(), db.clone(), settings);

        // 下游出错时上游只会看到通道关闭，所以从下游开始检查
        let (r1, r2, r3, r4, r5) = tokio::try_join!(t1, t2, t3, t4, t5)?;
        for r in [r5, r4, r3, r2, r1] {
            r?;
        }

        pb.finish_with_message("图片添加完成");

        let (total, degraded) = db.count().await?;
        info!("商品总数: {}，缺少特征: {}", total, degraded);

        Ok(())
    }
}
