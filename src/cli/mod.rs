mod add;
mod export;
mod r#match;
mod refresh;
mod search;
mod seed;
pub mod server;
mod show;

pub use add::*;
pub use export::*;
pub use r#match::*;
pub use refresh::*;
pub use search::*;
pub use seed::*;
pub use server::*;
pub use show::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

