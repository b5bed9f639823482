use crate::error::Result;
use crate::linker::matcher::{CompanyIndex, DEFAULT_BLOCKED_ORGANIZATIONS};
use crate::model::BucketWindow;
use crate::storage::entity::company_link;
use crate::storage::repository::{CompanyRepository, LinkRepository, RecordCursor};
use async_trait::async_trait;
use log::{debug, info};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashSet;

pub const DEFAULT_LINK_BATCH_SIZE: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub time_bucket: String,
    pub record_id: String,
    pub organizations: Option<String>,
}

/// 新闻索引：按 (time_bucket, record_id) 顺序分页读取
#[async_trait]
pub trait NewsIndex: Send + Sync {
    async fn records_page(
        &self,
        window: Option<&BucketWindow>,
        after: Option<&RecordCursor>,
        size: u64,
    ) -> Result<Vec<NewsItem>>;
}

pub struct StoreNewsIndex<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> StoreNewsIndex<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NewsIndex for StoreNewsIndex<'_> {
    async fn records_page(
        &self,
        window: Option<&BucketWindow>,
        after: Option<&RecordCursor>,
        size: u64,
    ) -> Result<Vec<NewsItem>> {
        let rows = LinkRepository::records_page(self.db, window, after, size).await?;
        Ok(rows
            .into_iter()
            .map(|r| NewsItem {
                time_bucket: r.time_bucket,
                record_id: r.record_id,
                organizations: r.organizations,
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub batch_size: u64,
    pub window: Option<BucketWindow>,
    pub blocked: Vec<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_LINK_BATCH_SIZE,
            window: None,
            blocked: DEFAULT_BLOCKED_ORGANIZATIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct LinkStats {
    pub records_scanned: u64,
    pub records_matched: u64,
    /// 匹配出的 (record, company) 对，含已存在的
    pub links_found: u64,
    /// 本次新写入的行
    pub links_written: u64,
}

pub struct CompanyLinker;

impl CompanyLinker {
    pub async fn run(
        db: &DatabaseConnection,
        index: &dyn NewsIndex,
        cfg: &LinkConfig,
    ) -> Result<LinkStats> {
        let mut stats = LinkStats::default();
        let companies = CompanyRepository::all(db).await?;
        let company_index = CompanyIndex::build(&companies, &cfg.blocked);
        if company_index.is_empty() {
            info!("公司表为空，跳过关联");
            return Ok(stats);
        }

        let page_size = cfg.batch_size.max(1);
        let mut cursor: Option<RecordCursor> = None;
        let mut pending: HashSet<company_link::Model> = HashSet::new();

        loop {
            let page = index
                .records_page(cfg.window.as_ref(), cursor.as_ref(), page_size)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some((last.time_bucket.clone(), last.record_id.clone()));
            let page_len = page.len() as u64;

            for item in page {
                stats.records_scanned += 1;
                let Some(orgs) = item.organizations.as_deref() else {
                    continue;
                };
                let ciks = company_index.match_field(orgs);
                if ciks.is_empty() {
                    continue;
                }
                stats.records_matched += 1;
                for cik in ciks {
                    pending.insert(company_link::Model {
                        time_bucket: item.time_bucket.clone(),
                        record_id: item.record_id.clone(),
                        cik,
                    });
                }
            }

            if pending.len() as u64 >= page_size {
                stats.links_found += pending.len() as u64;
                stats.links_written += LinkRepository::insert_links(db, &pending).await?;
                pending.clear();
            }
            debug!(
                "已扫描 {} 条新闻，命中 {} 条",
                stats.records_scanned, stats.records_matched
            );
            if page_len < page_size {
                break;
            }
        }

        if !pending.is_empty() {
            stats.links_found += pending.len() as u64;
            stats.links_written += LinkRepository::insert_links(db, &pending).await?;
        }

        info!(
            "✓ 关联完成: 扫描 {} 条, 命中 {} 条, 新写入 {} 行 (共匹配 {} 对)",
            stats.records_scanned, stats.records_matched, stats.links_written, stats.links_found
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    async fn fixture() -> DatabaseConnection {
        let db = testkit::memory_db().await;
        testkit::seed_company(&db, 320193, "Apple Inc.", Some("AAPL")).await;
        testkit::seed_company(&db, 1318605, "Tesla, Inc.", Some("TSLA")).await;
        testkit::seed_company(&db, 101538, "United States Antimony Corp", None).await;
        testkit::seed_news(&db, "20250601000000", "r1", "Apple;Tesla;united states", "https://a").await;
        testkit::seed_news(&db, "20250601000000", "r2", "apple;APPLE inc.", "https://b").await;
        testkit::seed_news(&db, "20250602120000", "r3", "Acme Widgets", "https://c").await;
        testkit::seed_news(&db, "20250603080000", "r4", "TSLA", "https://d").await;
        db
    }

    #[tokio::test]
    async fn links_each_matching_pair_once() {
        let db = fixture().await;
        let cfg = LinkConfig {
            batch_size: 2,
            ..Default::default()
        };
        let stats = CompanyLinker::run(&db, &StoreNewsIndex::new(&db), &cfg)
            .await
            .unwrap();
        assert_eq!(stats.records_scanned, 4);
        assert_eq!(stats.records_matched, 3);
        assert_eq!(stats.links_written, 4);
        assert_eq!(LinkRepository::count(&db).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn relinking_adds_no_duplicates() {
        let db = fixture().await;
        let cfg = LinkConfig::default();
        let index = StoreNewsIndex::new(&db);
        CompanyLinker::run(&db, &index, &cfg).await.unwrap();
        let second = CompanyLinker::run(&db, &index, &cfg).await.unwrap();
        assert_eq!(second.links_found, 4);
        assert_eq!(second.links_written, 0);
        assert_eq!(LinkRepository::count(&db).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn window_limits_scanned_records() {
        let db = fixture().await;
        let cfg = LinkConfig {
            window: Some(
                BucketWindow::for_dates(testkit::date(2025, 6, 2), testkit::date(2025, 6, 3)).unwrap(),
            ),
            ..Default::default()
        };
        let stats = CompanyLinker::run(&db, &StoreNewsIndex::new(&db), &cfg)
            .await
            .unwrap();
        assert_eq!(stats.records_scanned, 2);
        assert_eq!(stats.links_written, 1);
    }
}
