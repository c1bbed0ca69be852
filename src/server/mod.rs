mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub use self::error::AppError;
pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(api::search_handler, api::products_handler, api::add_handler, api::reload_handler),
    components(schemas(
        types::SearchForm,
        types::SearchResponse,
        types::ProductsResponse,
        types::AddForm,
        types::AddResponse,
        types::ReloadResponse,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

async fn openapi_handler() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(ApiDoc::openapi())
}

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(api::search_handler))
        .route("/products", get(api::products_handler))
        .route("/add", post(api::add_handler))
        .route("/reload", post(api::reload_handler))
        .route("/metrics", get(api::metrics_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}
