use crate::error::{PipelineError, Result};
use crate::model::Cik;
use crate::report::dto::{
    CompanyResult, Evidence, EventInfo, ExperimentSummary, LabelEntry, LabelSet, ResultsPayload,
    RunMetricDto, RunMetricsPayload,
};
use crate::storage::entity::label_evidence;
use crate::storage::repository::{CompanyRepository, ExperimentRepository, MetricRepository, ScoreRepository};
use sea_orm::DatabaseConnection;
use serde_json::Value;

pub const DEFAULT_RESULTS_TOP_K: usize = 10;
pub const DEFAULT_EVIDENCE_PER_COMPANY: usize = 3;

pub fn edgar_url(cik: Cik, accession_number: &str, primary_document: &str) -> String {
    format!(
        "https://www.sec.gov/Archives/edgar/data/{}/{}/{}",
        cik,
        accession_number.replace('-', ""),
        primary_document
    )
}

fn event_info(e: label_evidence::Model) -> EventInfo {
    EventInfo {
        url: edgar_url(e.cik, &e.accession_number, &e.primary_document),
        accession_number: e.accession_number,
        item_code: e.item_code,
        filing_date: e.filing_date,
        primary_document: e.primary_document,
    }
}

pub struct ReportService;

impl ReportService {
    pub async fn experiments(db: &DatabaseConnection) -> Result<Vec<ExperimentSummary>> {
        let experiments = ExperimentRepository::list(db).await?;
        let mut runs = ExperimentRepository::run_ids_by_experiment(db).await?;
        let mut out = Vec::with_capacity(experiments.len());
        for e in experiments {
            out.push(ExperimentSummary {
                item_codes: serde_json::from_str(&e.item_codes)?,
                config: serde_json::from_str::<Value>(&e.config_json)?,
                run_ids: runs.remove(&e.id).unwrap_or_default(),
                id: e.id,
                predict_date: e.predict_date,
                horizon_days: e.horizon_days,
                neg_multiplier: e.neg_multiplier,
                seed: e.seed,
                created_at: e.created_at,
            });
        }
        Ok(out)
    }

    pub async fn labels(db: &DatabaseConnection, experiment_id: i32) -> Result<LabelSet> {
        ExperimentRepository::find(db, experiment_id)
            .await?
            .ok_or(PipelineError::ExperimentNotFound(experiment_id))?;
        let labels: Vec<LabelEntry> = ExperimentRepository::labels_for(db, experiment_id)
            .await?
            .into_iter()
            .map(|l| LabelEntry {
                cik: l.cik,
                label: l.label,
            })
            .collect();
        let positives = labels.iter().filter(|l| l.label == 1).count();
        Ok(LabelSet {
            experiment_id,
            positives,
            negatives: labels.len() - positives,
            labels,
        })
    }

    /// k_filter 为空时返回全部 K
    pub async fn run_metrics(
        db: &DatabaseConnection,
        run_id: i32,
        k_filter: &[u32],
    ) -> Result<RunMetricsPayload> {
        let run = ScoreRepository::find_run(db, run_id)
            .await?
            .ok_or(PipelineError::RunNotFound(run_id))?;
        let mut metrics = Vec::new();
        for m in MetricRepository::metrics_for_run(db, run_id).await? {
            if !k_filter.is_empty() && !k_filter.iter().any(|k| i64::from(*k) == i64::from(m.k)) {
                continue;
            }
            metrics.push(RunMetricDto {
                k: m.k,
                top_ciks: serde_json::from_str(&m.top_ciks)?,
                top_scores: serde_json::from_str(&m.top_scores)?,
                positives_in_top: m.positives_in_top,
                total_positives: m.total_positives,
                recall: m.recall,
                precision: m.precision,
                computed_at: m.computed_at,
            });
        }
        Ok(RunMetricsPayload {
            run_id,
            experiment_id: run.experiment_id,
            metrics,
        })
    }

    /// 排名前 top_k 的公司及其证据文章、首条触发披露
    pub async fn results(
        db: &DatabaseConnection,
        experiment_id: i32,
        run_id: i32,
        top_k: usize,
        evidence_per_company: usize,
    ) -> Result<ResultsPayload> {
        let experiment = ExperimentRepository::find(db, experiment_id)
            .await?
            .ok_or(PipelineError::ExperimentNotFound(experiment_id))?;
        let run = ScoreRepository::find_run(db, run_id)
            .await?
            .ok_or(PipelineError::RunNotFound(run_id))?;
        if run.experiment_id != experiment_id {
            return Err(PipelineError::RunExperimentMismatch {
                run_id,
                expected: experiment_id,
                actual: run.experiment_id,
            });
        }

        let mut rows = ScoreRepository::company_scores_for_run(db, run_id).await?;
        rows.truncate(top_k);
        let ciks: Vec<Cik> = rows.iter().map(|r| r.cik).collect();

        let names = CompanyRepository::titles_for(db, &ciks).await?;
        let mut evidence = ScoreRepository::evidence_for(db, run_id, &ciks, evidence_per_company).await?;
        let mut events = ExperimentRepository::first_evidence(db, experiment_id, &ciks).await?;

        let companies = rows
            .into_iter()
            .enumerate()
            .map(|(i, r)| CompanyResult {
                rank: i + 1,
                cik: r.cik,
                company_name: names.get(&r.cik).cloned(),
                total_score: r.total_score,
                article_count: r.article_count,
                label: r.label,
                evidence: evidence
                    .remove(&r.cik)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|a| Evidence {
                        llm_score: a.score,
                        summary: a.reason,
                        url: a.article_url,
                        title: a.article_title,
                        evaluated_at: a.evaluated_at,
                    })
                    .collect(),
                event: events.remove(&r.cik).map(event_info),
            })
            .collect();

        Ok(ResultsPayload {
            experiment_id,
            run_id,
            predict_date: experiment.predict_date,
            horizon_days: experiment.horizon_days,
            top_k,
            companies,
        })
    }
}
