use crate::config::ExperimentConfig;
use crate::error::{PipelineError, Result};
use crate::labels::generator::{horizon_bounds, plan_labels, LabelPlan};
use crate::labels::item_codes::extract_item_codes;
use crate::model::{Cik, FilingEvent};
use crate::storage::entity::{experiment, label_evidence};
use crate::storage::repository::{
    CompanyRepository, ExperimentRepository, FilingRepository, LinkRepository, NewExperiment,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{info, warn};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// 披露数据来源
#[async_trait]
pub trait FilingSource: Send + Sync {
    async fn get_filings(&self, cik: Cik) -> Result<Vec<FilingEvent>>;
}

/// 一次性把区间内的 company_filings 读进内存
pub struct StoreFilingSource {
    by_cik: HashMap<Cik, Vec<FilingEvent>>,
}

impl StoreFilingSource {
    pub async fn preload(db: &DatabaseConnection, after: NaiveDate, until: NaiveDate) -> Result<Self> {
        let rows = FilingRepository::filings_between(db, after, until).await?;
        let mut by_cik: HashMap<Cik, Vec<FilingEvent>> = HashMap::new();
        for row in rows {
            let item_codes = extract_item_codes(row.items.as_deref().unwrap_or_default());
            by_cik.entry(row.cik).or_default().push(FilingEvent {
                accession_number: row.accession_number,
                form: row.form,
                filing_date: row.filing_date,
                primary_document: row.primary_document,
                item_codes,
            });
        }
        Ok(Self { by_cik })
    }
}

#[async_trait]
impl FilingSource for StoreFilingSource {
    async fn get_filings(&self, cik: Cik) -> Result<Vec<FilingEvent>> {
        Ok(self.by_cik.get(&cik).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelOutcome {
    pub experiment_id: i32,
    pub universe_size: usize,
    pub positives: usize,
    pub negatives: usize,
    pub requested_negatives: usize,
    pub skipped_outside_universe: usize,
    pub capped_positives: usize,
    pub unmatched_positives: usize,
    pub warnings: Vec<String>,
}

pub struct LabelService;

impl LabelService {
    pub async fn create_experiment(db: &DatabaseConnection, cfg: &ExperimentConfig) -> Result<i32> {
        cfg.validate()?;
        let new = NewExperiment {
            predict_date: cfg.predict_date,
            horizon_days: i32::try_from(cfg.horizon_days)
                .map_err(|_| PipelineError::invalid("horizon_days is out of range"))?,
            item_codes_json: serde_json::to_string(&cfg.item_codes)?,
            neg_multiplier: i32::try_from(cfg.neg_multiplier)
                .map_err(|_| PipelineError::invalid("neg_multiplier is out of range"))?,
            seed: cfg
                .seed
                .map(i64::try_from)
                .transpose()
                .map_err(|_| PipelineError::invalid("seed is out of range"))?,
            config_json: serde_json::to_string(cfg)?,
        };
        let created = ExperimentRepository::create(db, new).await?;
        info!(
            "✓ 实验 #{} 已创建: predict_date={} horizon={}d items={:?}",
            created.id, cfg.predict_date, cfg.horizon_days, cfg.item_codes
        );
        Ok(created.id)
    }

    pub async fn load(
        db: &DatabaseConnection,
        experiment_id: i32,
    ) -> Result<(experiment::Model, ExperimentConfig)> {
        let row = ExperimentRepository::find(db, experiment_id)
            .await?
            .ok_or(PipelineError::ExperimentNotFound(experiment_id))?;
        let cfg: ExperimentConfig = serde_json::from_str(&row.config_json)?;
        cfg.validate()?;
        Ok((row, cfg))
    }

    /// 重新生成该实验的全部标签与证据（整体替换）
    pub async fn generate(
        db: &DatabaseConnection,
        experiment_id: i32,
        source: &dyn FilingSource,
    ) -> Result<LabelOutcome> {
        let (_, cfg) = Self::load(db, experiment_id).await?;

        let companies = CompanyRepository::all_ciks(db).await?;
        let (universe, news_counts) = match cfg.news_window {
            Some(window) => {
                let buckets = window.buckets(cfg.predict_date);
                let counts = LinkRepository::news_counts(db, &buckets).await?;
                let universe: BTreeSet<Cik> = counts.keys().copied().collect();
                info!(
                    "新闻窗口 [{}, {}] 内有关联的公司 {} 家",
                    buckets.from,
                    buckets.to,
                    universe.len()
                );
                (universe, counts)
            }
            None => (companies.clone(), BTreeMap::new()),
        };

        let mut filings: BTreeMap<Cik, Vec<FilingEvent>> = BTreeMap::new();
        for cik in companies.union(&universe) {
            let events = source.get_filings(*cik).await?;
            if !events.is_empty() {
                filings.insert(*cik, events);
            }
        }

        let plan = plan_labels(&cfg, &filings, &universe, &news_counts);
        let warnings = Self::plan_warnings(&plan);
        for w in &warnings {
            warn!("⚠ 实验 #{experiment_id}: {w}");
        }
        if plan.skipped_outside_universe > 0 {
            info!(
                "实验 #{}: {} 家有触发披露的公司不在候选集合内，已跳过",
                experiment_id, plan.skipped_outside_universe
            );
        }

        let labels = plan.labels();
        let evidence = evidence_rows(experiment_id, &plan);
        let txn = db.begin().await?;
        ExperimentRepository::replace_labels(&txn, experiment_id, &labels, evidence).await?;
        txn.commit().await?;

        let (after, until) = horizon_bounds(cfg.predict_date, cfg.horizon_days);
        info!(
            "✓ 实验 #{} 标签已写入: 正例 {} / 负例 {} (披露区间 ({}, {}])",
            experiment_id,
            plan.positives.len(),
            plan.negatives.len(),
            after,
            until
        );

        Ok(LabelOutcome {
            experiment_id,
            universe_size: universe.len(),
            positives: plan.positives.len(),
            negatives: plan.negatives.len(),
            requested_negatives: plan.requested_negatives,
            skipped_outside_universe: plan.skipped_outside_universe,
            capped_positives: plan.capped_positives,
            unmatched_positives: plan.unmatched_positives.len(),
            warnings,
        })
    }

    fn plan_warnings(plan: &LabelPlan) -> Vec<String> {
        let mut out = Vec::new();
        if plan.positives.is_empty() {
            out.push("no company filed a matching disclosure inside the horizon".to_string());
        }
        let shortfall = plan.negative_shortfall();
        if shortfall > 0 && plan.unmatched_positives.is_empty() {
            out.push(format!(
                "requested {} negatives but only {} candidates were available",
                plan.requested_negatives,
                plan.negatives.len()
            ));
        } else if shortfall > 0 {
            out.push(format!(
                "news-volume matching produced {} of {} requested negatives",
                plan.negatives.len(),
                plan.requested_negatives
            ));
        }
        if !plan.unmatched_positives.is_empty() {
            out.push(format!(
                "dropped {} positives without a news-volume match: {:?}",
                plan.unmatched_positives.len(),
                plan.unmatched_positives
            ));
        }
        out
    }
}

fn evidence_rows(experiment_id: i32, plan: &LabelPlan) -> Vec<label_evidence::Model> {
    plan.positives
        .iter()
        .flat_map(|(cik, evidence)| {
            evidence.iter().map(move |e| label_evidence::Model {
                experiment_id,
                cik: *cik,
                accession_number: e.accession_number.clone(),
                item_code: e.item_code.clone(),
                filing_date: e.filing_date,
                primary_document: e.primary_document.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NegativeStrategy;
    use crate::model::NewsWindow;
    use crate::storage::repository::ExperimentRepository;
    use crate::testkit;

    fn base_config() -> ExperimentConfig {
        let mut cfg = ExperimentConfig::new(testkit::date(2025, 7, 1));
        cfg.horizon_days = 30;
        cfg.item_codes = vec!["2.01".into()];
        cfg.neg_multiplier = 2;
        cfg.seed = Some(11);
        cfg
    }

    async fn seeded() -> DatabaseConnection {
        let db = testkit::memory_db().await;
        testkit::seed_companies(&db, 1..=20).await;
        testkit::seed_filing(&db, 1, "0001-25-000001", testkit::date(2025, 7, 3), "2.01,9.01").await;
        testkit::seed_filing(&db, 2, "0002-25-000001", testkit::date(2025, 7, 9), "2.01").await;
        testkit::seed_filing(&db, 2, "0002-25-000002", testkit::date(2025, 7, 19), "Item 2.01").await;
        testkit::seed_filing(&db, 3, "0003-25-000001", testkit::date(2025, 7, 30), "2.01").await;
        testkit::seed_filing(&db, 4, "0004-25-000001", testkit::date(2025, 7, 1), "2.01").await;
        testkit::seed_filing(&db, 5, "0005-25-000001", testkit::date(2025, 7, 10), "5.02").await;
        db
    }

    async fn generate(db: &DatabaseConnection, cfg: &ExperimentConfig) -> (i32, LabelOutcome) {
        let id = LabelService::create_experiment(db, cfg).await.unwrap();
        let (after, until) = horizon_bounds(cfg.predict_date, cfg.horizon_days);
        let source = StoreFilingSource::preload(db, after, until).await.unwrap();
        let outcome = LabelService::generate(db, id, &source).await.unwrap();
        (id, outcome)
    }

    #[tokio::test]
    async fn writes_positives_negatives_and_evidence() {
        let db = seeded().await;
        let (id, outcome) = generate(&db, &base_config()).await;

        assert_eq!(outcome.positives, 3);
        assert_eq!(outcome.negatives, 6);
        assert!(outcome.warnings.is_empty());

        let labels = ExperimentRepository::labels_for(&db, id).await.unwrap();
        assert_eq!(labels.len(), 9);
        let positives: Vec<Cik> = labels.iter().filter(|l| l.label == 1).map(|l| l.cik).collect();
        assert_eq!(positives, vec![1, 2, 3]);

        let first = ExperimentRepository::first_evidence(&db, id, &[2]).await.unwrap();
        assert_eq!(first[&2].accession_number, "0002-25-000001");
    }

    #[tokio::test]
    async fn out_of_range_seed_is_rejected_before_insert() {
        let db = seeded().await;
        let mut cfg = base_config();
        cfg.seed = Some(u64::MAX);
        let err = LabelService::create_experiment(&db, &cfg).await;
        assert!(matches!(err, Err(PipelineError::InvalidConfig(_))));
        assert!(ExperimentRepository::list(&db).await.unwrap().is_empty());

        cfg.seed = Some(i64::MAX as u64);
        let id = LabelService::create_experiment(&db, &cfg).await.unwrap();
        let row = ExperimentRepository::find(&db, id).await.unwrap().unwrap();
        assert_eq!(row.seed, Some(i64::MAX));
    }

    #[tokio::test]
    async fn regenerating_with_seed_is_idempotent() {
        let db = seeded().await;
        let (id, _) = generate(&db, &base_config()).await;
        let before = ExperimentRepository::labels_for(&db, id).await.unwrap();

        let (after, until) = horizon_bounds(testkit::date(2025, 7, 1), 30);
        let source = StoreFilingSource::preload(&db, after, until).await.unwrap();
        LabelService::generate(&db, id, &source).await.unwrap();
        let again = ExperimentRepository::labels_for(&db, id).await.unwrap();
        assert_eq!(before, again);
    }

    #[tokio::test]
    async fn small_universe_warns_instead_of_failing() {
        let db = seeded().await;
        let mut cfg = base_config();
        cfg.neg_multiplier = 10;
        let (_, outcome) = generate(&db, &cfg).await;
        assert_eq!(outcome.requested_negatives, 30);
        assert_eq!(outcome.negatives, 17);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn news_window_restricts_universe_to_linked_companies() {
        let db = seeded().await;
        for (cik, n) in [(1, 3), (2, 1), (7, 2), (8, 1), (9, 1), (10, 4)] {
            for i in 0..n {
                let id = format!("{cik}-{i}");
                testkit::seed_news(&db, "20250615120000", &id, "org", "https://news.test/a").await;
                testkit::seed_link(&db, "20250615120000", &id, cik).await;
            }
        }
        let mut cfg = base_config();
        cfg.neg_multiplier = 1;
        cfg.news_window = Some(NewsWindow::new(31, 1).unwrap());
        let (id, outcome) = generate(&db, &cfg).await;

        assert_eq!(outcome.universe_size, 6);
        assert_eq!(outcome.skipped_outside_universe, 1);
        let labels = ExperimentRepository::label_map(&db, id).await.unwrap();
        assert_eq!(labels.len(), 4);
        assert!(labels.keys().all(|c| [1, 2, 7, 8, 9, 10].contains(c)));
    }

    #[tokio::test]
    async fn news_matched_strategy_is_reproducible_without_seed() {
        let db = seeded().await;
        for (cik, n) in [(1, 3), (2, 1), (7, 3), (8, 1), (9, 20)] {
            for i in 0..n {
                let id = format!("{cik}-{i}");
                testkit::seed_news(&db, "20250610000000", &id, "org", "https://news.test/b").await;
                testkit::seed_link(&db, "20250610000000", &id, cik).await;
            }
        }
        let mut cfg = base_config();
        cfg.seed = None;
        cfg.neg_multiplier = 1;
        cfg.news_window = Some(NewsWindow::new(31, 1).unwrap());
        cfg.negative_strategy = NegativeStrategy::NewsVolumeMatched { max_log_diff: 0.2 };

        let (a, _) = generate(&db, &cfg).await;
        let (b, _) = generate(&db, &cfg).await;
        let la = ExperimentRepository::label_map(&db, a).await.unwrap();
        let lb = ExperimentRepository::label_map(&db, b).await.unwrap();
        assert_eq!(la, lb);
        assert_eq!(la.get(&7), Some(&0));
        assert_eq!(la.get(&8), Some(&0));
    }

    #[tokio::test]
    async fn unknown_experiment_is_an_error() {
        let db = testkit::memory_db().await;
        let source = StoreFilingSource::preload(&db, testkit::date(2025, 1, 1), testkit::date(2025, 2, 1))
            .await
            .unwrap();
        let err = LabelService::generate(&db, 404, &source).await;
        assert!(matches!(err, Err(PipelineError::ExperimentNotFound(404))));
    }
}
