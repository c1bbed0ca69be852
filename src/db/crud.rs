use sqlx::{Executor, Result, Sqlite, SqlitePool};

use super::ProductRecord;

const PRODUCT_COLUMNS: &str = r#"
    id, hash, name, category, price, image_url, description, features, legacy_color, updated_at
"#;

/// 添加商品记录
#[allow(clippy::too_many_arguments)]
pub async fn add_product<'c, E>(
    executor: E,
    hash: Option<&[u8]>,
    name: &str,
    category: &str,
    price: f64,
    image_url: &str,
    description: &str,
    features: Option<&[u8]>,
    legacy_color: Option<&[u8]>,
) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_scalar(
        r#"
        INSERT INTO product (hash, name, category, price, image_url, description, features, legacy_color)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(hash)
    .bind(name)
    .bind(category)
    .bind(price)
    .bind(image_url)
    .bind(description)
    .bind(features)
    .bind(legacy_color)
    .fetch_one(executor)
    .await
}

/// 检查图片哈希是否存在
pub async fn check_hash(executor: &SqlitePool, hash: &[u8]) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM product WHERE hash = ?
        "#,
    )
    .bind(hash)
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

/// 检查是否已有同一地址、但图片无法读取的商品
pub async fn check_unhashed(executor: &SqlitePool, image_url: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM product WHERE hash IS NULL AND image_url = ?
        "#,
    )
    .bind(image_url)
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

/// 更新图片哈希对应的商品图片地址
pub async fn update_image_url(executor: &SqlitePool, hash: &[u8], image_url: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE product SET image_url = ? WHERE hash = ?
        "#,
    )
    .bind(image_url)
    .bind(hash)
    .execute(executor)
    .await?;

    Ok(())
}

/// 更新商品特征
pub async fn update_features<'c, E>(executor: E, id: i64, features: Option<&[u8]>) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE product
        SET features = ?, updated_at = CAST(strftime('%s', 'now') AS INTEGER)
        WHERE id = ?
        "#,
    )
    .bind(features)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(())
}

/// 获取所有商品，按 ID 排序
pub async fn get_products(executor: &SqlitePool) -> Result<Vec<ProductRecord>> {
    sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM product ORDER BY id ASC"))
        .fetch_all(executor)
        .await
}

/// 获取没有特征的商品
pub async fn get_degraded_products(executor: &SqlitePool) -> Result<Vec<ProductRecord>> {
    sqlx::query_as(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM product WHERE features IS NULL ORDER BY id ASC"
    ))
    .fetch_all(executor)
    .await
}

/// 查询商品总数与缺少特征的商品数量
pub async fn get_count(executor: &SqlitePool) -> Result<(i64, i64)> {
    sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(features IS NULL), 0) FROM product
        "#,
    )
    .fetch_one(executor)
    .await
}
