use clap::Parser;
use vismatch::Opts;
use vismatch::cli::SubCommandExtend;
use vismatch::config::SubCommand;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Add(config) => config.run(&opts).await,
        SubCommand::Seed(config) => config.run(&opts).await,
        SubCommand::Refresh(config) => config.run(&opts).await,
        SubCommand::Search(config) => config.run(&opts).await,
        SubCommand::Show(config) => config.run(&opts).await,
        SubCommand::Match(config) => config.run(&opts).await,
        SubCommand::Export(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
    }
}
