use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{FeatureOptions, FetchOptions, Opts, RankOptions};
use crate::fetch::Fetcher;

#[derive(Parser, Debug, Clone)]
pub struct MatchCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    #[command(flatten)]
    pub rank: RankOptions,
    #[command(flatten)]
    pub fetch: FetchOptions,
    /// 图片1
    pub image1: String,
    /// 图片2
    pub image2: String,
    /// 两张图片共同的类别，用于计算类别加分
    #[arg(long, value_name = "NAME")]
    pub category: Option<String>,
}

impl SubCommandExtend for MatchCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let fetcher = Fetcher::new(self.fetch.timeout())?;
        let (mut a, mut b) = tokio::try_join!(
            fetcher.fetch_features(&self.image1, &self.feature),
            fetcher.fetch_features(&self.image2, &self.feature),
        )?;
        a.category = self.category.clone();
        b.category = self.category.clone();

        let scorer = self.rank.scorer();
        for score in scorer.channel_scores(&a, &b) {
            match score.similarity {
                Some(similarity) => {
                    println!("{}\t{:.2}\t{:.4}", score.channel, score.weight, similarity)
                }
                None => println!("{}\t{:.2}\t-", score.channel, score.weight),
            }
        }
        println!("score\t\t{:.4}", scorer.score_records(&a, &b));

        Ok(())
    }
}
