use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{FeatureOptions, FetchOptions, Opts};
use crate::features::Channel;
use crate::fetch::Fetcher;

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    #[command(flatten)]
    pub fetch: FetchOptions,
    /// 图片路径或 URL
    pub image: String,
    /// 只显示每个特征通道的长度，不输出完整的特征
    #[arg(long)]
    pub summary: bool,
}

impl SubCommandExtend for ShowCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let fetcher = Fetcher::new(self.fetch.timeout())?;
        let record = fetcher.fetch_features(&self.image, &self.feature).await?;

        if self.summary {
            if let Some(stats) = record.image_stats {
                println!("size\t{}x{}\tchannels\t{}", stats.width, stats.height, stats.channels);
            }
            for channel in Channel::ALL {
                println!("{}\t{}", channel, record.channel(channel).len());
            }
        } else {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Ok(())
    }
}
