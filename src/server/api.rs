use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum_auth::AuthBearer;
use axum_typed_multipart::TypedMultipart;
use log::info;
use prometheus::{Encoder, TextEncoder};

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::db::NewProduct;
use crate::fetch::extract_blocking;
use crate::metrics::{self, QuerySource};
use crate::utils::hash_bytes;

/// 搜索与上传图片相似的商品
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "没有上传图片，或图片无法解码"),
        (status = 404, description = "商品库中没有商品"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    TypedMultipart(data): TypedMultipart<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();

    let (bytes, source) = match (data.file, &data.image_url) {
        (Some(file), _) if !file.is_empty() => (file.to_vec(), QuerySource::Upload),
        (_, Some(url)) if !url.is_empty() => {
            info!("正在下载查询图片: {}", url);
            let bytes = state.fetcher.fetch(url).await.map_err(AppError::bad_request)?;
            (bytes, QuerySource::Url)
        }
        _ => return Err(AppError::bad_request(anyhow::anyhow!("需要上传图片文件或提供图片 URL"))),
    };

    let catalog = state.db.snapshot().await;
    if catalog.is_empty() {
        return Err(AppError::not_found("商品库中没有商品"));
    }

    let mut query =
        extract_blocking(bytes, state.feature.clone()).await.map_err(AppError::bad_request)?;
    query.category = data.category;

    let mut policy = state.rank.policy();
    if let Some(limit) = data.limit {
        policy.limit = limit;
    }
    if let Some(max_per_category) = data.max_per_category {
        policy.max_per_category = max_per_category;
    }
    let result = state.db.search_with(&query, &state.rank.scorer(), &policy).await;

    let elapsed = start.elapsed();
    let size = query.image_stats.map(|s| (s.width, s.height)).unwrap_or_default();
    metrics::observe_search(
        size,
        source,
        elapsed.as_secs_f32(),
        result.first().map(|r| r.similarity),
    );
    info!("搜索完成: {} 个结果，耗时 {}ms", result.len(), elapsed.as_millis());

    Ok(Json(SearchResponse { time: elapsed.as_millis() as u64, total: catalog.len(), result }))
}

/// 列出商品库中的所有商品
#[utoipa::path(
    get,
    path = "/products",
    responses(
        (status = 200, body = ProductsResponse),
    )
)]
pub async fn products_handler(State(state): State<Arc<AppState>>) -> Json<ProductsResponse> {
    let catalog = state.db.snapshot().await;
    let products = catalog.entries().iter().map(|e| e.info.clone()).collect();
    Json(ProductsResponse { products })
}

/// 添加商品到数据库，并重新加载商品库
#[utoipa::path(
    post,
    path = "/add",
    request_body(content = AddForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = AddResponse),
        (status = 401, description = "token 无效"),
    ),
    security(("bearer" = []))
)]
pub async fn add_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    TypedMultipart(data): TypedMultipart<AddRequest>,
) -> Result<Json<AddResponse>> {
    if !state.authorized(&token) {
        return Err(AppError::unauthorized());
    }

    // 写入数据库之前先检查所有文件
    let uploads = data
        .file
        .into_iter()
        .map(|file| match file.metadata.file_name {
            Some(file_name) if !file_name.is_empty() => Ok(Upload { file_name, contents: file.contents }),
            _ => Err(AppError::bad_request(anyhow::anyhow!("文件名不能为空"))),
        })
        .collect::<Result<Vec<_>>>()?;
    let fields = ProductFields {
        category: data.category,
        name: data.name,
        price: data.price.unwrap_or_default(),
        description: data.description.unwrap_or_default(),
    };

    Ok(Json(add_uploads(&state, uploads, &fields).await?))
}

/// 保存上传的图片并添加商品
///
/// 只要有商品写入就会重新加载商品库，即使后面的图片出错
pub async fn add_uploads(
    state: &AppState,
    uploads: Vec<Upload>,
    fields: &ProductFields,
) -> anyhow::Result<AddResponse> {
    let mut response = AddResponse::default();
    let result = store_uploads(state, uploads, fields, &mut response).await;
    if !response.added.is_empty() {
        metrics::set_catalog_size(state.db.reload().await?);
    }
    result.map(|_| response)
}

async fn store_uploads(
    state: &AppState,
    uploads: Vec<Upload>,
    fields: &ProductFields,
    response: &mut AddResponse,
) -> anyhow::Result<()> {
    for upload in uploads {
        let hash = hash_bytes(&upload.contents);
        if state.db.check_hash(&hash).await? {
            response.skipped += 1;
            continue;
        }

        // 保存原图，之后可以用 refresh 重新提取特征
        let path = state.upload_path(&hash, &upload.file_name);
        tokio::fs::create_dir_all(&state.upload_dir).await?;
        tokio::fs::write(&path, &upload.contents).await?;

        let features = match extract_blocking(upload.contents.to_vec(), state.feature.clone()).await {
            Ok(features) => Some(features),
            Err(e) => {
                log::warn!("无法提取图片 {} 的特征: {}", upload.file_name, e);
                response.degraded += 1;
                None
            }
        };
        let name = fields.name.clone().unwrap_or_else(|| {
            Path::new(&upload.file_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| upload.file_name.clone())
        });

        let id = state
            .db
            .add_product(&NewProduct {
                hash: Some(hash),
                name,
                category: fields.category.clone(),
                price: fields.price,
                image_url: path.to_string_lossy().into_owned(),
                description: fields.description.clone(),
                features,
                legacy_color: vec![],
            })
            .await?;
        response.added.push(id);
    }
    Ok(())
}

/// 从数据库重新加载商品库
#[utoipa::path(
    post,
    path = "/reload",
    responses(
        (status = 200, body = ReloadResponse),
        (status = 401, description = "token 无效"),
    ),
    security(("bearer" = []))
)]
pub async fn reload_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Json<ReloadResponse>> {
    if !state.authorized(&token) {
        return Err(AppError::unauthorized());
    }
    let total = state.db.reload().await?;
    metrics::set_catalog_size(total);
    Ok(Json(ReloadResponse { total }))
}

/// prometheus 指标
pub async fn metrics_handler() -> Result<impl IntoResponse> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_owned())], buffer))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use axum::body::Bytes;
    use clap::Parser;
    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;
    use crate::CatalogDBBuilder;
    use crate::cli::server::ServerCommand;
    use crate::config::ConfDir;
    use crate::fetch::Fetcher;

    async fn state(dir: &Path) -> Arc<AppState> {
        let conf_dir: ConfDir = dir.to_str().unwrap().parse().unwrap();
        let db = CatalogDBBuilder::new(conf_dir.clone()).open().await.unwrap();
        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();
        let opts = ServerCommand::parse_from(["server", "--token", "secret"]);
        AppState::new(db, fetcher, opts, conf_dir.uploads()).await
    }

    fn png(color: [u8; 3]) -> Bytes {
        let mut buf = Cursor::new(vec![]);
        RgbImage::from_pixel(16, 16, Rgb(color)).write_to(&mut buf, ImageFormat::Png).unwrap();
        Bytes::from(buf.into_inner())
    }

    fn upload(file_name: &str, contents: Bytes) -> Upload {
        Upload { file_name: file_name.to_owned(), contents }
    }

    fn fields() -> ProductFields {
        ProductFields {
            category: "Shoes".to_owned(),
            name: None,
            price: 9.9,
            description: String::new(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_degraded_upload_can_be_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        let garbage = Bytes::from_static(b"not an image");

        let uploads = vec![upload("red.png", png([255, 0, 0])), upload("broken.png", garbage.clone())];
        let response = add_uploads(&state, uploads, &fields()).await.unwrap();
        assert_eq!(response.added.len(), 2);
        assert_eq!(response.degraded, 1);

        let snapshot = state.db.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        let broken = snapshot.entries().iter().find(|e| e.info.name == "broken").unwrap();
        assert!(broken.features.is_none());

        // 图片地址指向保存下来的原图
        let url = &broken.info.image_url;
        assert!(Path::new(url).starts_with(dir.path().join("uploads")));
        assert_eq!(state.fetcher.fetch(url).await.unwrap(), garbage.to_vec());

        // 重复上传会被跳过
        let response = add_uploads(&state, vec![upload("again.png", png([255, 0, 0]))], &fields())
            .await
            .unwrap();
        assert!(response.added.is_empty());
        assert_eq!(response.skipped, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_partial_failure_still_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;

        // 在第二张图片的保存位置放一个目录，让写入失败
        let blue = png([0, 0, 255]);
        std::fs::create_dir_all(state.upload_path(&hash_bytes(&blue), "blue.png")).unwrap();

        let uploads = vec![upload("red.png", png([255, 0, 0])), upload("blue.png", blue)];
        assert!(add_uploads(&state, uploads, &fields()).await.is_err());

        // 第一张图片已经写入，搜索快照与数据库保持一致
        let snapshot = state.db.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.entries()[0].info.name, "red");
        assert_eq!(state.db.count().await.unwrap(), (1, 0));
    }
}
