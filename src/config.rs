use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::features::Channel;
use crate::rank::RankPolicy;
use crate::similarity::{Scorer, Weights};

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "vismatch", "vismatch").expect("failed to get project dir");
    ConfDir { path: proj_dirs.config_dir().to_path_buf() }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap()
}

#[derive(Args, Debug, Clone)]
pub struct FeatureOptions {
    /// 颜色直方图每个通道的分桶数量，总长度为其立方
    #[arg(long, value_name = "N", default_value_t = 16, value_parser = clap::value_parser!(u32).range(1..=256))]
    pub histogram_bins: u32,
    /// 主色调聚类中心数量
    #[arg(long, value_name = "K", default_value_t = 5)]
    pub cluster_count: usize,
    /// 主色调聚类迭代次数
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub cluster_iterations: usize,
    /// 主色调聚类初始化使用的随机种子，相同种子保证结果可复现
    #[arg(long, value_name = "SEED", default_value_t = 42)]
    pub cluster_seed: u64,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        Self { histogram_bins: 16, cluster_count: 5, cluster_iterations: 10, cluster_seed: 42 }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RankOptions {
    /// 相似度不超过该值的结果会被丢弃
    #[arg(long, value_name = "SCORE", default_value_t = 0.05)]
    pub noise_floor: f32,
    /// 同类别商品的额外加分
    #[arg(long, value_name = "SCORE", default_value_t = 0.10)]
    pub category_bonus: f32,
    /// 每个类别最多保留的结果数量
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub max_per_category: usize,
    /// 显示的结果数量
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub limit: usize,
    /// 覆盖某个特征通道的权重，可以多次指定
    /// 例：--weight colorHistogram=0.3 --weight shapeFeatures=0
    #[arg(long = "weight", value_name = "CHANNEL=WEIGHT", value_parser = parse_weight, verbatim_doc_comment)]
    pub weights: Vec<(Channel, f32)>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            noise_floor: 0.05,
            category_bonus: 0.10,
            max_per_category: 3,
            limit: 10,
            weights: vec![],
        }
    }
}

impl RankOptions {
    /// 在默认权重的基础上应用用户指定的权重
    pub fn weights(&self) -> Weights {
        let mut weights = Weights::default();
        for &(channel, weight) in &self.weights {
            weights.set(channel, weight);
        }
        weights
    }

    pub fn scorer(&self) -> Scorer {
        Scorer::new(self.weights(), self.category_bonus)
    }

    pub fn policy(&self) -> RankPolicy {
        RankPolicy {
            noise_floor: self.noise_floor,
            max_per_category: self.max_per_category,
            limit: self.limit,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct FetchOptions {
    /// 下载图片的超时时间，单位为秒
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub fetch_timeout: u64,
    /// 同时下载的图片数量
    #[arg(long, value_name = "N", default_value_t = 8)]
    pub fetch_concurrency: usize,
}

impl FetchOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "vismatch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// vismatch 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 扫描目录或 tar 归档，提取图片特征并添加到商品库
    Add(AddCommand),
    /// 从 JSON 清单导入商品，图片可以是 URL 或本地路径
    Seed(SeedCommand),
    /// 重新提取商品的图片特征
    Refresh(RefreshCommand),
    /// 从商品库中搜索相似商品
    Search(SearchCommand),
    /// 显示一张图片提取出的特征
    Show(ShowCommand),
    /// 比较两张图片各个特征通道的相似度
    Match(MatchCommand),
    /// 导出商品库中的特征向量
    Export(ExportCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("vismatch.db")
    }

    /// 服务器保存上传图片的目录
    pub fn uploads(&self) -> PathBuf {
        self.path.join("uploads")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

fn parse_weight(s: &str) -> anyhow::Result<(Channel, f32)> {
    let Some((channel, weight)) = s.split_once('=') else {
        return Err(anyhow::anyhow!("无效的权重: {}", s));
    };
    let weight: f32 = weight.trim().parse()?;
    if !weight.is_finite() || weight < 0.0 {
        return Err(anyhow::anyhow!("权重必须是非负数: {}", s));
    }
    Ok((channel.trim().parse()?, weight))
}
