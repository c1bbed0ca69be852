use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::Serialize;
use utoipa::ToSchema;

use crate::catalog::{ProductInfo, SearchResult};

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    pub file: Option<Bytes>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
    pub max_per_category: Option<usize>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 上传的图片文件，与 `image_url` 二选一
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: Option<String>,
    /// 图片 URL，与 `file` 二选一
    pub image_url: Option<String>,
    /// 查询图片所属的类别，同类别商品会获得额外加分
    pub category: Option<String>,
    /// 返回的结果数量
    pub limit: Option<usize>,
    /// 每个类别最多返回的结果数量
    pub max_per_category: Option<usize>,
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    /// 商品库中的商品数量
    pub total: usize,
    /// 按相似度降序排列的商品
    pub result: Vec<SearchResult>,
}

/// 商品列表响应
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductsResponse {
    pub products: Vec<ProductInfo>,
}

/// 添加商品请求
#[derive(TryFromMultipart)]
pub struct AddRequest {
    pub file: Vec<FieldData<Bytes>>,
    pub category: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
}

/// 一张已通过检查的上传图片
pub struct Upload {
    pub file_name: String,
    pub contents: Bytes,
}

/// 同一次上传中所有商品共用的信息
pub struct ProductFields {
    pub category: String,
    pub name: Option<String>,
    pub price: f64,
    pub description: String,
}

/// 添加商品表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct AddForm {
    /// 商品图片，可以是多张图片，每张图片对应一个商品
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 商品类别
    pub category: String,
    /// 商品名称，默认使用文件名
    pub name: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
}

/// 添加商品响应
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct AddResponse {
    /// 新增商品的 ID
    pub added: Vec<i64>,
    /// 已存在而被跳过的图片数量
    pub skipped: usize,
    /// 无法提取特征的图片数量
    pub degraded: usize,
}

/// 重新加载响应
#[derive(Debug, Serialize, ToSchema)]
pub struct ReloadResponse {
    /// 重新加载后的商品数量
    pub total: usize,
}
