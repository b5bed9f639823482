//! 测试夹具：内存库与种子数据
use crate::config::{ExperimentConfig, StoreConfig};
use crate::model::Cik;
use crate::scoring::{ArticleScorer, ArticleSource, ArticleText, CompanyContext, ScoreError, ScoreResult};
use crate::storage::entity::{article_score, company, company_link, filing, news_record};
use crate::storage::establish_connection;
use crate::storage::repository::{
    CompanyRepository, ExperimentRepository, FilingRepository, LinkRepository, NewExperiment,
    NewScoringRun, ScoreRepository,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

pub async fn memory_db() -> DatabaseConnection {
    establish_connection(&StoreConfig::in_memory())
        .await
        .expect("in-memory sqlite")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub async fn seed_company(db: &DatabaseConnection, cik: Cik, title: &str, ticker: Option<&str>) {
    CompanyRepository::upsert_many(
        db,
        vec![company::Model {
            cik,
            title: title.to_string(),
            ticker: ticker.map(str::to_string),
        }],
    )
    .await
    .expect("seed company");
}

pub async fn seed_companies(db: &DatabaseConnection, ciks: impl IntoIterator<Item = Cik>) {
    let rows = ciks
        .into_iter()
        .map(|cik| company::Model {
            cik,
            title: format!("Company {cik}"),
            ticker: None,
        })
        .collect();
    CompanyRepository::upsert_many(db, rows)
        .await
        .expect("seed companies");
}

pub async fn seed_filing(db: &DatabaseConnection, cik: Cik, accession: &str, on: NaiveDate, items: &str) {
    FilingRepository::upsert_many(
        db,
        vec![filing::Model {
            cik,
            accession_number: accession.to_string(),
            form: "8-K".to_string(),
            filing_date: on,
            primary_document: format!("{accession}.htm"),
            items: Some(items.to_string()),
        }],
    )
    .await
    .expect("seed filing");
}

pub async fn seed_news(db: &DatabaseConnection, bucket: &str, record_id: &str, organizations: &str, url: &str) {
    LinkRepository::insert_records(
        db,
        vec![news_record::Model {
            time_bucket: bucket.to_string(),
            record_id: record_id.to_string(),
            organizations: Some(organizations.to_string()),
            themes: None,
            document_url: Some(url.to_string()),
            title: Some(format!("Headline {record_id}")),
            snippet: None,
        }],
    )
    .await
    .expect("seed news");
}

/// 无标题无摘要的新闻，打分时需要抓取正文
pub async fn seed_bare_news(db: &DatabaseConnection, bucket: &str, record_id: &str, url: &str) {
    LinkRepository::insert_records(
        db,
        vec![news_record::Model {
            time_bucket: bucket.to_string(),
            record_id: record_id.to_string(),
            organizations: None,
            themes: None,
            document_url: Some(url.to_string()),
            title: None,
            snippet: None,
        }],
    )
    .await
    .expect("seed bare news");
}

pub async fn seed_link(db: &DatabaseConnection, bucket: &str, record_id: &str, cik: Cik) {
    let links = HashSet::from([company_link::Model {
        time_bucket: bucket.to_string(),
        record_id: record_id.to_string(),
        cik,
    }]);
    LinkRepository::insert_links(db, &links)
        .await
        .expect("seed link");
}

/// 直接写入实验与标签，跳过标签生成
pub async fn labelled_experiment(db: &DatabaseConnection, predict_date: NaiveDate, labels: &[(Cik, i32)]) -> i32 {
    let cfg = ExperimentConfig::new(predict_date);
    let created = ExperimentRepository::create(
        db,
        NewExperiment {
            predict_date,
            horizon_days: cfg.horizon_days as i32,
            item_codes_json: serde_json::to_string(&cfg.item_codes).expect("item codes"),
            neg_multiplier: cfg.neg_multiplier as i32,
            seed: None,
            config_json: serde_json::to_string(&cfg).expect("config"),
        },
    )
    .await
    .expect("seed experiment");
    ExperimentRepository::replace_labels(db, created.id, labels, Vec::new())
        .await
        .expect("seed labels");
    created.id
}

pub async fn scoring_run(db: &DatabaseConnection, experiment_id: i32) -> i32 {
    ScoreRepository::create_run(
        db,
        NewScoringRun {
            experiment_id,
            min_days_before: 31,
            max_days_before: 1,
            batch_size: 4,
            model_name: "stub".to_string(),
            run_label: None,
        },
    )
    .await
    .expect("seed run")
    .id
}

pub async fn seed_article_score(
    db: &DatabaseConnection,
    run_id: i32,
    experiment_id: i32,
    cik: Cik,
    record_id: &str,
    score: i32,
) {
    ScoreRepository::upsert_article_scores(
        db,
        vec![article_score::Model {
            run_id,
            cik,
            record_id: record_id.to_string(),
            experiment_id,
            time_bucket: "20250615000000".to_string(),
            article_url: format!("https://news.test/{record_id}"),
            article_title: None,
            score,
            reason: format!("score {score}"),
            label: None,
            evaluated_at: 1_750_000_000 + score as i64,
        }],
    )
    .await
    .expect("seed article score");
}

/// 原样返回库内文本
pub struct StoredArticles;

#[async_trait]
impl ArticleSource for StoredArticles {
    async fn load(&self, url: &str, stored: &ArticleText) -> Result<ArticleText, ScoreError> {
        Ok(ArticleText {
            url: url.to_string(),
            ..stored.clone()
        })
    }
}

/// 模拟网页抓取并计数；dead 中的 URL 返回 HTTP 错误
#[derive(Default)]
pub struct CountingFetcher {
    dead: HashSet<String>,
    fetches: AtomicUsize,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dead(mut self, url: &str) -> Self {
        self.dead.insert(url.to_string());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleSource for CountingFetcher {
    async fn load(&self, url: &str, _: &ArticleText) -> Result<ArticleText, ScoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.dead.contains(url) {
            return Err(ScoreError::Http(format!("404 fetching {url}")));
        }
        Ok(ArticleText {
            url: url.to_string(),
            title: Some(format!("Fetched {url}")),
            snippet: None,
        })
    }
}

/// 固定分数的打分器，可对指定 URL 返回错误
pub struct FixedScorer {
    score: i32,
    failures: HashMap<String, ScoreError>,
    calls: AtomicUsize,
}

impl FixedScorer {
    pub fn new(score: i32) -> Self {
        Self {
            score,
            failures: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, url: &str, err: ScoreError) -> Self {
        self.failures.insert(url.to_string(), err);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleScorer for FixedScorer {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn score(&self, article: &ArticleText, _: &CompanyContext) -> Result<ScoreResult, ScoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.get(&article.url) {
            return Err(err.clone());
        }
        Ok(ScoreResult {
            score: self.score,
            reason: format!("fixed score for {}", article.url),
        })
    }
}
