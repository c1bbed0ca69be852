use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use tokio::sync::RwLock;

use crate::catalog::{Catalog, CatalogEntry, SearchResult};
use crate::config::ConfDir;
use crate::db::{Database, NewProduct, ProductRecord, crud, encode_features, encode_legacy_color, init_db};
use crate::features::FeatureRecord;
use crate::rank::{RankPolicy, rank};
use crate::similarity::Scorer;

pub struct CatalogDBBuilder {
    conf_dir: ConfDir,
    scorer: Scorer,
    policy: RankPolicy,
}

impl CatalogDBBuilder {
    pub fn new(conf_dir: ConfDir) -> Self {
        Self { conf_dir, scorer: Scorer::default(), policy: RankPolicy::default() }
    }

    /// 搜索时使用的相似度计算方式
    pub fn scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// 搜索时使用的排序策略
    pub fn policy(mut self, policy: RankPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn open(self) -> Result<CatalogDB> {
        let db = init_db(self.conf_dir.database()).await?;
        let catalog_db = CatalogDB {
            db,
            catalog: RwLock::new(Arc::new(Catalog::default())),
            scorer: self.scorer,
            policy: self.policy,
        };
        catalog_db.reload().await?;
        Ok(catalog_db)
    }
}

/// 商品数据库，同时持有一份用于搜索的商品库快照
pub struct CatalogDB {
    db: Database,
    catalog: RwLock<Arc<Catalog>>,
    scorer: Scorer,
    policy: RankPolicy,
}

impl CatalogDB {
    /// 检查图片哈希是否已存在
    pub async fn check_hash(&self, hash: &[u8]) -> Result<bool> {
        Ok(crud::check_hash(&self.db, hash).await?)
    }

    /// 检查同一地址是否已有无法读取的商品
    pub async fn check_unhashed(&self, image_url: &str) -> Result<bool> {
        Ok(crud::check_unhashed(&self.db, image_url).await?)
    }

    /// 添加商品，不会自动更新搜索快照
    pub async fn add_product(&self, product: &NewProduct) -> Result<i64> {
        let features = encode_features(product.features.as_ref())?;
        let legacy_color = encode_legacy_color(&product.legacy_color)?;
        let id = crud::add_product(
            &self.db,
            product.hash.as_deref(),
            &product.name,
            &product.category,
            product.price,
            &product.image_url,
            &product.description,
            features.as_deref(),
            legacy_color.as_deref(),
        )
        .await?;
        Ok(id)
    }

    /// 更新已存在图片的地址
    pub async fn update_image_url(&self, hash: &[u8], image_url: &str) -> Result<()> {
        Ok(crud::update_image_url(&self.db, hash, image_url).await?)
    }

    /// 批量更新商品特征，在同一个事务中提交
    pub async fn update_features(&self, updates: &[(i64, FeatureRecord)]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for (id, record) in updates {
            let features = encode_features(Some(record))?;
            crud::update_features(&mut *tx, *id, features.as_deref()).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn products(&self) -> Result<Vec<ProductRecord>> {
        Ok(crud::get_products(&self.db).await?)
    }

    /// 没有特征的商品
    pub async fn degraded_products(&self) -> Result<Vec<ProductRecord>> {
        Ok(crud::get_degraded_products(&self.db).await?)
    }

    /// 返回 (商品总数, 缺少特征的商品数量)
    pub async fn count(&self) -> Result<(i64, i64)> {
        Ok(crud::get_count(&self.db).await?)
    }

    /// 从数据库重新加载商品库快照，返回商品数量
    ///
    /// 正在进行的搜索继续使用旧快照
    pub async fn reload(&self) -> Result<usize> {
        let mut entries = vec![];
        for record in self.products().await? {
            // 解码失败的商品仍然保留，只是不参与相似度计算
            let features = record.decode_features().unwrap_or_else(|e| {
                warn!("无法解码商品 {} 的特征: {}", record.id, e);
                None
            });
            let legacy_color = record.decode_legacy_color().unwrap_or_else(|e| {
                warn!("无法解码商品 {} 的颜色向量: {}", record.id, e);
                vec![]
            });
            entries.push(CatalogEntry { info: record.info(), features, legacy_color });
        }
        let catalog = Arc::new(Catalog::new(entries));
        let total = catalog.len();
        *self.catalog.write().await = catalog;
        info!("商品库已加载: {} 个商品", total);
        Ok(total)
    }

    /// 当前的商品库快照
    pub async fn snapshot(&self) -> Arc<Catalog> {
        self.catalog.read().await.clone()
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn policy(&self) -> &RankPolicy {
        &self.policy
    }

    /// 使用默认参数搜索相似商品
    pub async fn search(&self, query: &FeatureRecord) -> Vec<SearchResult> {
        self.search_with(query, &self.scorer, &self.policy).await
    }

    /// 使用指定参数搜索相似商品
    pub async fn search_with(
        &self,
        query: &FeatureRecord,
        scorer: &Scorer,
        policy: &RankPolicy,
    ) -> Vec<SearchResult> {
        let catalog = self.snapshot().await;
        let query = query.clone();
        let (scorer, policy) = (*scorer, *policy);
        tokio::task::block_in_place(move || {
            rank(&query, catalog.entries(), &scorer, &policy).iter().map(|m| m.to_result()).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, category: &str, features: Option<FeatureRecord>) -> NewProduct {
        NewProduct {
            hash: Some(name.as_bytes().to_vec()),
            name: name.to_owned(),
            category: category.to_owned(),
            price: 10.0,
            image_url: format!("{name}.png"),
            features,
            ..Default::default()
        }
    }

    fn hist(values: &[f32]) -> FeatureRecord {
        FeatureRecord { color_histogram: values.to_vec(), ..Default::default() }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reload_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let db = CatalogDBBuilder::new(dir.path().to_str().unwrap().parse().unwrap())
            .open()
            .await
            .unwrap();
        assert!(db.snapshot().await.is_empty());

        db.add_product(&product("red", "Shoes", Some(hist(&[1.0, 0.0])))).await.unwrap();
        let old = db.snapshot().await;
        assert!(old.is_empty());

        assert_eq!(db.reload().await.unwrap(), 1);
        assert_eq!(db.snapshot().await.len(), 1);
        // 旧快照不受影响
        assert!(old.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_and_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let db = CatalogDBBuilder::new(dir.path().to_str().unwrap().parse().unwrap())
            .open()
            .await
            .unwrap();
        db.add_product(&product("red", "Shoes", Some(hist(&[1.0, 0.0])))).await.unwrap();
        let broken = db.add_product(&product("broken", "Shoes", None)).await.unwrap();
        db.reload().await.unwrap();

        let results = db.search(&hist(&[1.0, 0.0])).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].product.name, "red");
        assert!(results[0].enhanced_match);

        assert_eq!(db.count().await.unwrap(), (2, 1));
        db.update_features(&[(broken, hist(&[0.9, 0.1]))]).await.unwrap();
        assert!(db.degraded_products().await.unwrap().is_empty());

        db.reload().await.unwrap();
        let results = db.search(&hist(&[1.0, 0.0])).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].product.name, "broken");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_undecodable_features_kept_in_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let db = CatalogDBBuilder::new(dir.path().to_str().unwrap().parse().unwrap())
            .open()
            .await
            .unwrap();
        db.add_product(&product("red", "Shoes", Some(hist(&[1.0, 0.0])))).await.unwrap();
        crud::add_product(
            &db.db,
            None,
            "corrupt",
            "Shoes",
            1.0,
            "corrupt.png",
            "",
            Some(&b"garbage"[..]),
            Some(&b"bad"[..]),
        )
        .await
        .unwrap();

        assert_eq!(db.reload().await.unwrap(), 2);
        let snapshot = db.snapshot().await;
        let corrupt = snapshot.entries().iter().find(|e| e.info.name == "corrupt").unwrap();
        assert!(corrupt.features.is_none());
        assert!(corrupt.legacy_color.is_empty());
        assert!(!corrupt.is_enhanced());

        // 无法解码的商品得分为 0，不会出现在结果中
        let results = db.search(&hist(&[1.0, 0.0])).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].product.name, "red");
    }
}
