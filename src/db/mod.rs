use std::path::Path;

use log::info;
use sqlx::sqlite::*;

pub mod crud;
pub mod model;

pub use model::*;

pub type Database = SqlitePool;

/// 打开商品数据库，不存在时自动创建并执行迁移
pub async fn init_db(filename: impl AsRef<Path>) -> Result<Database, sqlx::Error> {
    let filename = filename.as_ref();
    if let Some(parent) = filename.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!("打开商品数据库: {}", filename.display());

    let options = SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .filename(filename)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    sqlx::migrate!().run(&pool).await?;

    Ok(pool)
}
