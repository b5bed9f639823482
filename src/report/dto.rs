use crate::model::Cik;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSummary {
    pub id: i32,
    pub predict_date: NaiveDate,
    pub horizon_days: i32,
    pub item_codes: Vec<String>,
    pub neg_multiplier: i32,
    pub seed: Option<i64>,
    pub created_at: i64,
    pub config: Value,
    pub run_ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LabelEntry {
    pub cik: Cik,
    pub label: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelSet {
    pub experiment_id: i32,
    pub positives: usize,
    pub negatives: usize,
    pub labels: Vec<LabelEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetricDto {
    pub k: i32,
    pub top_ciks: Vec<Cik>,
    pub top_scores: Vec<i64>,
    pub positives_in_top: i32,
    pub total_positives: i32,
    pub recall: f64,
    pub precision: f64,
    pub computed_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetricsPayload {
    pub run_id: i32,
    pub experiment_id: i32,
    pub metrics: Vec<RunMetricDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    pub llm_score: i32,
    pub summary: String,
    pub url: String,
    pub title: Option<String>,
    pub evaluated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventInfo {
    pub accession_number: String,
    pub item_code: String,
    pub filing_date: NaiveDate,
    pub primary_document: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyResult {
    pub rank: usize,
    pub cik: Cik,
    pub company_name: Option<String>,
    pub total_score: i64,
    pub article_count: i64,
    pub label: Option<i32>,
    pub evidence: Vec<Evidence>,
    pub event: Option<EventInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsPayload {
    pub experiment_id: i32,
    pub run_id: i32,
    pub predict_date: NaiveDate,
    pub horizon_days: i32,
    pub top_k: usize,
    pub companies: Vec<CompanyResult>,
}
