use crate::aggregate::aggregator::{aggregate_scores, CompanyAggregate};
use crate::error::{PipelineError, Result};
use crate::model::Cik;
use crate::storage::entity::run_company_score;
use crate::storage::repository::{ExperimentRepository, ScoreRepository};
use chrono::Utc;
use log::{info, warn};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AggregateOutcome {
    pub run_id: i32,
    pub experiment_id: i32,
    pub articles: usize,
    pub companies: usize,
    pub missing_labels: Vec<Cik>,
    pub dry_run: bool,
}

pub struct ScoreAggregator;

impl ScoreAggregator {
    /// 覆盖式重算该 run 的公司聚合分；dry_run 只计算不写库
    pub async fn run(db: &DatabaseConnection, run_id: i32, dry_run: bool) -> Result<AggregateOutcome> {
        let run = ScoreRepository::find_run(db, run_id)
            .await?
            .ok_or(PipelineError::RunNotFound(run_id))?;
        let labels = ExperimentRepository::label_map(db, run.experiment_id).await?;

        let txn = db.begin().await?;
        if !dry_run {
            ScoreRepository::refresh_article_labels(&txn, run_id, run.experiment_id).await?;
        }
        let scores = ScoreRepository::article_scores_for_run(&txn, run_id).await?;
        let articles = scores.len();
        let aggregates = aggregate_scores(scores.into_iter().map(|s| (s.cik, s.score)), &labels);

        let missing_labels: Vec<Cik> = aggregates
            .iter()
            .filter(|a| a.label.is_none())
            .map(|a| a.cik)
            .collect();
        if !missing_labels.is_empty() {
            warn!(
                "⚠ 运行 #{}: {} 家公司有文章分但没有标签，label 记为 NULL 且不参与指标: {:?}",
                run_id,
                missing_labels.len(),
                missing_labels
            );
        }

        if dry_run {
            txn.rollback().await?;
            for a in top_by_score(&aggregates, 10) {
                info!(
                    "[dry-run] cik={} total={} articles={} label={:?}",
                    a.cik, a.total_score, a.article_count, a.label
                );
            }
        } else {
            let now = Utc::now().timestamp();
            let rows = aggregates
                .iter()
                .map(|a| run_company_score::Model {
                    run_id,
                    cik: a.cik,
                    experiment_id: run.experiment_id,
                    total_score: a.total_score,
                    article_count: a.article_count,
                    label: a.label,
                    computed_at: now,
                })
                .collect();
            ScoreRepository::replace_company_scores(&txn, run_id, rows).await?;
            txn.commit().await?;
            info!(
                "✓ 运行 #{} 聚合完成: {} 篇文章分 -> {} 家公司",
                run_id,
                articles,
                aggregates.len()
            );
        }

        Ok(AggregateOutcome {
            run_id,
            experiment_id: run.experiment_id,
            articles,
            companies: aggregates.len(),
            missing_labels,
            dry_run,
        })
    }
}

fn top_by_score(aggregates: &[CompanyAggregate], n: usize) -> Vec<&CompanyAggregate> {
    let mut sorted: Vec<&CompanyAggregate> = aggregates.iter().collect();
    sorted.sort_by(|a, b| b.total_score.cmp(&a.total_score).then(a.cik.cmp(&b.cik)));
    sorted.truncate(n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[tokio::test]
    async fn persists_sums_and_null_labels() {
        let db = testkit::memory_db().await;
        let exp = testkit::labelled_experiment(&db, testkit::date(2025, 7, 1), &[(1, 1), (2, 0)]).await;
        let run = testkit::scoring_run(&db, exp).await;
        testkit::seed_article_score(&db, run, exp, 1, "a", 5).await;
        testkit::seed_article_score(&db, run, exp, 1, "b", 3).await;
        testkit::seed_article_score(&db, run, exp, 2, "a", 2).await;
        testkit::seed_article_score(&db, run, exp, 9, "c", 4).await;

        let outcome = ScoreAggregator::run(&db, run, false).await.unwrap();
        assert_eq!(outcome.companies, 3);
        assert_eq!(outcome.missing_labels, vec![9]);

        let rows = ScoreRepository::company_scores_for_run(&db, run).await.unwrap();
        let summary: Vec<(Cik, i64, i64, Option<i32>)> = rows
            .iter()
            .map(|r| (r.cik, r.total_score, r.article_count, r.label))
            .collect();
        assert_eq!(
            summary,
            vec![(1, 8, 2, Some(1)), (9, 4, 1, None), (2, 2, 1, Some(0))]
        );

        let articles = ScoreRepository::article_scores_for_run(&db, run).await.unwrap();
        assert_eq!(articles.iter().find(|a| a.cik == 9).map(|a| a.label), Some(None));
    }

    #[tokio::test]
    async fn reaggregation_overwrites_instead_of_double_counting() {
        let db = testkit::memory_db().await;
        let exp = testkit::labelled_experiment(&db, testkit::date(2025, 7, 1), &[(1, 1)]).await;
        let run = testkit::scoring_run(&db, exp).await;
        testkit::seed_article_score(&db, run, exp, 1, "a", 2).await;

        ScoreAggregator::run(&db, run, false).await.unwrap();
        ScoreAggregator::run(&db, run, false).await.unwrap();
        let rows = ScoreRepository::company_scores_for_run(&db, run).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_score, 2);

        testkit::seed_article_score(&db, run, exp, 1, "b", 5).await;
        ScoreAggregator::run(&db, run, false).await.unwrap();
        let rows = ScoreRepository::company_scores_for_run(&db, run).await.unwrap();
        assert_eq!(rows[0].total_score, 7);
        assert_eq!(rows[0].article_count, 2);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let db = testkit::memory_db().await;
        let exp = testkit::labelled_experiment(&db, testkit::date(2025, 7, 1), &[(1, 1)]).await;
        let run = testkit::scoring_run(&db, exp).await;
        testkit::seed_article_score(&db, run, exp, 1, "a", 2).await;

        let outcome = ScoreAggregator::run(&db, run, true).await.unwrap();
        assert_eq!(outcome.companies, 1);
        assert!(ScoreRepository::company_scores_for_run(&db, run).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_run_is_an_error() {
        let db = testkit::memory_db().await;
        let err = ScoreAggregator::run(&db, 77, false).await;
        assert!(matches!(err, Err(PipelineError::RunNotFound(77))));
    }
}
