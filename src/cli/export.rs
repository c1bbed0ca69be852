use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::{info, warn};
use ndarray::{Array1, Array2};
use ndarray_npy::write_npy;

use crate::catalog::Catalog;
use crate::cli::SubCommandExtend;
use crate::{CatalogDBBuilder, Opts};

#[derive(Parser, Debug, Clone)]
pub struct ExportCommand {
    /// 输出目录，生成 features.npy 和 ids.npy
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

/// 将所有多通道特征按通道顺序展开为矩阵，返回 (商品 ID, 特征矩阵)
///
/// 特征长度与第一个商品不一致的商品会被跳过
pub fn feature_matrix(catalog: &Catalog) -> Result<(Array1<i64>, Array2<f32>)> {
    let mut ids = vec![];
    let mut data = vec![];
    let mut dim = None;
    for entry in catalog.entries() {
        let Some(features) = entry.features.as_ref().filter(|f| !f.is_degraded()) else {
            continue;
        };
        let row = features.concat();
        match dim {
            None => dim = Some(row.len()),
            Some(dim) if dim != row.len() => {
                warn!("跳过商品 {}: 特征长度 {} != {}", entry.info.id, row.len(), dim);
                continue;
            }
            _ => {}
        }
        ids.push(entry.info.id);
        data.extend(row);
    }

    let rows = ids.len();
    let matrix = Array2::from_shape_vec((rows, dim.unwrap_or(0)), data)?;
    Ok((Array1::from(ids), matrix))
}

impl SubCommandExtend for ExportCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let db = CatalogDBBuilder::new(opts.conf_dir.clone()).open().await?;
        let (ids, features) = feature_matrix(&*db.snapshot().await)?;
        if ids.is_empty() {
            bail!("没有可以导出的特征");
        }

        std::fs::create_dir_all(&self.output)?;
        write_npy(self.output.join("features.npy"), &features)?;
        write_npy(self.output.join("ids.npy"), &ids)?;
        info!("导出成功: {} 个商品，特征维度 {}", features.nrows(), features.ncols());
        Ok(())
    }
}
