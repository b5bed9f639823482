use crate::error::{PipelineError, Result};
use crate::metrics::calculator::{compute_metrics, rank_companies, MetricRow};
use crate::storage::entity::run_metric;
use crate::storage::repository::{MetricRepository, ScoreRepository};
use chrono::Utc;
use log::{info, warn};
use sea_orm::DatabaseConnection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct MetricsOutcome {
    pub run_id: i32,
    pub ranked_companies: usize,
    pub excluded_unlabelled: usize,
    pub metrics: Vec<MetricRow>,
    pub dry_run: bool,
}

pub struct MetricsCalculator;

impl MetricsCalculator {
    /// k_values 需已经过 sanitize_k_values
    pub async fn run(
        db: &DatabaseConnection,
        run_id: i32,
        k_values: &[u32],
        dry_run: bool,
    ) -> Result<MetricsOutcome> {
        ScoreRepository::find_run(db, run_id)
            .await?
            .ok_or(PipelineError::RunNotFound(run_id))?;

        let rows = ScoreRepository::company_scores_for_run(db, run_id).await?;
        let total_rows = rows.len();
        let ranked = rank_companies(rows.into_iter().map(|r| (r.cik, r.total_score, r.label)));
        let excluded = total_rows - ranked.len();
        if excluded > 0 {
            warn!("⚠ 运行 #{run_id}: {excluded} 家公司缺少标签，不参与排名");
        }

        if ranked.is_empty() {
            warn!("⚠ 运行 #{run_id}: 没有可排名的公司分数，先执行 aggregate");
            return Ok(MetricsOutcome {
                run_id,
                ranked_companies: 0,
                excluded_unlabelled: excluded,
                metrics: Vec::new(),
                dry_run,
            });
        }

        let metrics = compute_metrics(&ranked, k_values);
        for m in &metrics {
            info!(
                "运行 #{} K={}: 命中 {}/{} recall={:.4} precision={:.4}",
                run_id, m.k, m.positives_in_top, m.total_positives, m.recall, m.precision
            );
        }

        if !dry_run {
            let now = Utc::now().timestamp();
            let mut models = Vec::with_capacity(metrics.len());
            for m in &metrics {
                models.push(run_metric::Model {
                    run_id,
                    k: i32::try_from(m.k)
                        .map_err(|_| PipelineError::invalid(format!("K value {} is out of range", m.k)))?,
                    top_ciks: serde_json::to_string(&m.top_ciks)?,
                    top_scores: serde_json::to_string(&m.top_scores)?,
                    positives_in_top: count_i32(m.positives_in_top)?,
                    total_positives: count_i32(m.total_positives)?,
                    recall: m.recall,
                    precision: m.precision,
                    computed_at: now,
                });
            }
            MetricRepository::upsert_many(db, models).await?;
            info!("✓ 运行 #{} 指标已写入 ({} 个 K)", run_id, metrics.len());
        }

        Ok(MetricsOutcome {
            run_id,
            ranked_companies: ranked.len(),
            excluded_unlabelled: excluded,
            metrics,
            dry_run,
        })
    }
}

fn count_i32(n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| PipelineError::invalid(format!("count {n} is out of range")))
}
