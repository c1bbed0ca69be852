use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use anyhow::{Result, anyhow};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressIterator};
use log::{info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use regex::Regex;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tokio::task::{JoinHandle, spawn_blocking};
use tokio_tar::Archive;
use walkdir::WalkDir;

use super::types::*;
use crate::CatalogDB;
use crate::FeatureOptions;
use crate::db::NewProduct;
use crate::features::extract_features;
use crate::utils::{hash_bytes, name_and_category, pb_style, pb_style_speed};

static POOL: LazyLock<ThreadPool> = LazyLock::new(|| {
    ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .thread_name(|i| format!("extract-{i}"))
        .build()
        .expect("failed to build thread pool")
});

/// 没有所在目录时使用的商品类别
const DEFAULT_CATEGORY: &str = "uncategorized";

fn closed<T>(_: T) -> anyhow::Error {
    anyhow!("下游任务已退出")
}

/// 添加商品时使用的设置
#[derive(Clone)]
pub struct AddSettings {
    pub overwrite: bool,
    pub replace: Option<(Regex, String)>,
    pub category: Option<String>,
    pub price: f64,
    /// 图片来自 tar 归档，图片地址无法直接读取
    pub archive: bool,
}

impl AddSettings {
    fn image_url<'a>(&self, path: &'a str) -> std::borrow::Cow<'a, str> {
        match &self.replace {
            Some((re, replace)) => re.replace(path, replace.as_str()),
            None => path.into(),
        }
    }
}

pub fn task_scan(
    path: PathBuf,
    pb: ProgressBar,
    regex_suf: Regex,
) -> (JoinHandle<Result<()>>, Receiver<ImageData>) {
    let (tx, rx) = channel(num_cpus::get());
    let t = tokio::spawn(async move {
        if path.is_file() {
            scan_tar(path, tx, regex_suf, pb).await
        } else {
            scan_directory(path, tx, regex_suf, pb).await
        }
    });
    (t, rx)
}

pub fn task_hash(
    mut lrx: Receiver<ImageData>,
) -> (JoinHandle<Result<()>>, Receiver<HashedImageData>) {
    let (tx, rx) = channel(num_cpus::get());
    let t = spawn_blocking(move || {
        let mut buffer = vec![];
        let tx = &tx;
        // NOTE: 一次读取 cpu * 10 组数据，等待计算完成后再读取下一批，避免内存占用过高
        while lrx.blocking_recv_many(&mut buffer, num_cpus::get() * 10) != 0 {
            POOL.scope(|s| {
                for data in buffer.drain(..) {
                    s.spawn(move |_| {
                        let hash = data.data.as_deref().map(hash_bytes);
                        let _ = tx.blocking_send(HashedImageData { path: data.path, data: data.data, hash });
                    });
                }
            });
            if tx.is_closed() {
                return Err(closed(()));
            }
        }
        Ok(())
    });
    (t, rx)
}

pub fn task_filter(
    mut lrx: Receiver<HashedImageData>,
    pb: ProgressBar,
    db: Arc<CatalogDB>,
    settings: AddSettings,
) -> (JoinHandle<Result<()>>, Receiver<HashedImageData>) {
    let (tx, rx) = channel(num_cpus::get());
    let t = tokio::spawn(async move {
        while let Some(data) = lrx.recv().await {
            if exists(&db, &settings, &data.path, data.hash.as_deref()).await? {
                skip_existing(&db, &pb, &settings, &data.path, data.hash.as_deref()).await?;
                pb.inc(1);
            } else {
                tx.send(data).await.map_err(closed)?;
            }
        }
        Ok(())
    });
    (t, rx)
}

pub fn task_calc(
    mut lrx: Receiver<HashedImageData>,
    pb: ProgressBar,
    opts: FeatureOptions,
) -> (JoinHandle<Result<()>>, Receiver<ProcessedImage>) {
    let (tx, rx) = channel(num_cpus::get());
    let t = spawn_blocking(move || {
        let mut buffer = vec![];
        let (tx, pb, opts) = (&tx, &pb, &opts);
        while lrx.blocking_recv_many(&mut buffer, num_cpus::get() * 10) != 0 {
            POOL.scope(|s| {
                for data in buffer.drain(..) {
                    s.spawn(move |_| {
                        let features = match data.data.map(|bytes| extract_features(&bytes, opts)) {
                            Some(Ok(features)) => Some(features),
                            Some(Err(e)) => {
                                pb.println(format!("提取特征失败 {}: {}", data.path, e));
                                None
                            }
                            None => None,
                        };
                        let _ = tx.blocking_send(ProcessedImage { path: data.path, hash: data.hash, features });
                    });
                }
            });
            if tx.is_closed() {
                return Err(closed(()));
            }
        }
        Ok(())
    });
    (t, rx)
}

pub fn task_add(
    mut lrx: Receiver<ProcessedImage>,
    pb: ProgressBar,
    db: Arc<CatalogDB>,
    settings: AddSettings,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        while let Some(data) = lrx.recv().await {
            // 这里再检查一次，因为可能存在处理过程中新增的重复图片
            if exists(&db, &settings, &data.path, data.hash.as_deref()).await? {
                skip_existing(&db, &pb, &settings, &data.path, data.hash.as_deref()).await?;
                pb.inc(1);
                continue;
            }
            if data.features.is_none() && settings.archive && settings.replace.is_none() {
                warn!("归档中的图片 {} 没有特征，未指定 --replace 时 refresh 无法重新读取", data.path);
            }

            let (name, category) = name_and_category(&data.path);
            let category = settings
                .category
                .clone()
                .or(category)
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());
            let image_url = settings.image_url(&data.path).into_owned();

            db.add_product(&NewProduct {
                hash: data.hash,
                name,
                category,
                price: settings.price,
                image_url: image_url.clone(),
                description: String::new(),
                features: data.features,
                legacy_color: vec![],
            })
            .await?;

            pb.set_message(image_url);
            pb.inc(1);
        }
        Ok(())
    })
}

/// 图片已添加：哈希相同，或者同一地址已有一个无法读取的商品
async fn exists(
    db: &CatalogDB,
    settings: &AddSettings,
    path: &str,
    hash: Option<&[u8]>,
) -> Result<bool> {
    if let Some(hash) = hash {
        if db.check_hash(hash).await? {
            return Ok(true);
        }
    }
    db.check_unhashed(&settings.image_url(path)).await
}

async fn skip_existing(
    db: &CatalogDB,
    pb: &ProgressBar,
    settings: &AddSettings,
    path: &str,
    hash: Option<&[u8]>,
) -> Result<()> {
    match hash {
        Some(hash) if settings.overwrite => {
            let image_url = settings.image_url(path);
            db.update_image_url(hash, &image_url).await?;
            pb.set_message(format!("更新图片地址: {}", image_url));
        }
        _ => pb.set_message(format!("跳过已添加图片: {}", path)),
    }
    Ok(())
}

async fn scan_directory(
    path: PathBuf,
    tx: Sender<ImageData>,
    regex_suf: Regex,
    pb: ProgressBar,
) -> Result<()> {
    info!("开始扫描目录: {}", path.display());
    let pb2 = ProgressBar::no_length().with_style(pb_style_speed());
    let mut entries = WalkDir::new(path)
        .into_iter()
        .progress_with(pb2)
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            let ext = path.extension()?;
            (path.is_file() && regex_suf.is_match(&ext.to_string_lossy()))
                .then(|| path.to_string_lossy().to_string())
        })
        .collect::<Vec<_>>();
    entries.sort();
    info!("扫描完成，共 {} 张图片", entries.len());

    pb.set_style(pb_style());
    pb.set_length(entries.len() as u64);

    let mut reads = futures::stream::iter(entries)
        .map(|entry| async move { (tokio::fs::read(&entry).await, entry) })
        .buffered(32);
    while let Some((data, path)) = reads.next().await {
        // 读取失败的图片仍然添加，之后可以用 refresh 重新提取特征
        let data = match data {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("读取图片失败 {}: {}", path, e);
                None
            }
        };
        tx.send(ImageData { path, data }).await.map_err(closed)?;
    }

    Ok(())
}

async fn scan_tar(
    path: PathBuf,
    tx: Sender<ImageData>,
    re_suf: Regex,
    pb: ProgressBar,
) -> Result<()> {
    info!("开始扫描归档: {}", path.display());
    let file = File::open(path).await?;
    let mut archive = Archive::new(file);
    let mut entries = archive.entries()?;

    pb.set_style(pb_style_speed());

    // NOTE: tar 的 entries 必须按顺序读取，不能乱序并发
    while let Some(entry) = entries.next().await {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?;
        let Some(ext) = path.extension() else {
            continue;
        };
        if !re_suf.is_match(&ext.to_string_lossy()) {
            continue;
        }

        let path = path.to_string_lossy().to_string();

        let mut data = Vec::with_capacity(entry.header().size()? as usize);
        entry.read_to_end(&mut data).await?;

        tx.send(ImageData { path, data: Some(data) }).await.map_err(closed)?;
    }
    Ok(())
}
