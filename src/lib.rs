pub mod catalog;
mod catalog_db;
pub mod cli;
pub mod config;
mod db;
pub mod decoder;
pub mod error;
pub mod features;
pub mod fetch;
mod metrics;
pub mod rank;
mod server;
pub mod similarity;
pub mod utils;

pub use catalog_db::{CatalogDB, CatalogDBBuilder};
pub use config::{FeatureOptions, Opts, RankOptions};
pub use db::{NewProduct, ProductRecord};
pub use error::FeatureError;
