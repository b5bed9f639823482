use crate::error::{PipelineError, Result};
use crate::model::NewsWindow;
use crate::scoring::article::ArticleSource;
use crate::scoring::types::{ArticleScorer, ArticleText, CompanyContext, LinkedCompany, ScoreResult};
use crate::storage::entity::article_score;
use crate::storage::repository::{CandidateRow, ExperimentRepository, NewScoringRun, ScoreRepository};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{info, warn};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_SCORING_BATCH_SIZE: usize = 8;

#[derive(Debug, Clone)]
pub struct ScoringRequest {
    pub experiment_id: i32,
    pub window: NewsWindow,
    /// 同时也是并发上限
    pub batch_size: usize,
    pub run_label: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: i32,
    pub candidate_rows: usize,
    pub articles: usize,
    pub articles_scored: usize,
    pub articles_skipped: usize,
    pub scores_written: u64,
}

pub struct ScoringRunner;

impl ScoringRunner {
    pub async fn run(
        db: &DatabaseConnection,
        req: &ScoringRequest,
        source: &dyn ArticleSource,
        scorer: &dyn ArticleScorer,
    ) -> Result<RunOutcome> {
        req.window.validate()?;
        if req.batch_size == 0 {
            return Err(PipelineError::invalid("batch_size must be positive"));
        }
        let experiment = ExperimentRepository::find(db, req.experiment_id)
            .await?
            .ok_or(PipelineError::ExperimentNotFound(req.experiment_id))?;
        if ExperimentRepository::label_count(db, experiment.id).await? == 0 {
            return Err(PipelineError::MissingLabels(experiment.id));
        }

        let buckets = req.window.buckets(experiment.predict_date);
        let run = ScoreRepository::create_run(
            db,
            NewScoringRun {
                experiment_id: experiment.id,
                min_days_before: days_i32(req.window.min_days_before)?,
                max_days_before: days_i32(req.window.max_days_before)?,
                batch_size: i32::try_from(req.batch_size)
                    .map_err(|_| PipelineError::invalid("batch_size is out of range"))?,
                model_name: scorer.model_name().to_string(),
                run_label: req.run_label.clone(),
            },
        )
        .await?;
        info!(
            "打分运行 #{} 已创建 (实验 #{}, 窗口 [{}, {}], 模型 {})",
            run.id,
            experiment.id,
            buckets.from,
            buckets.to,
            scorer.model_name()
        );

        let candidates = ScoreRepository::candidate_articles(db, experiment.id, &buckets).await?;
        let mut outcome = RunOutcome {
            run_id: run.id,
            candidate_rows: candidates.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            warn!("⚠ 运行 #{}: 窗口内没有候选文章", run.id);
            return Ok(outcome);
        }

        // 同一 URL 只打一次分，结果写给所有引用它的 (公司, 新闻) 行
        let mut by_url: BTreeMap<String, Vec<CandidateRow>> = BTreeMap::new();
        for row in candidates {
            by_url.entry(row.document_url.clone()).or_default().push(row);
        }
        outcome.articles = by_url.len();

        let mut results = stream::iter(by_url)
            .map(|(url, rows)| async move {
                let scored = score_article(&url, &rows, source, scorer).await;
                (url, rows, scored)
            })
            .buffer_unordered(req.batch_size);

        while let Some((url, rows, scored)) = results.next().await {
            match scored {
                Ok((text, result)) => {
                    let models = score_rows(run.id, experiment.id, &rows, &text, &result);
                    outcome.scores_written += ScoreRepository::upsert_article_scores(db, models).await?;
                    outcome.articles_scored += 1;
                }
                Err(e) => {
                    warn!("⚠ 跳过文章 {url}: {e}");
                    outcome.articles_skipped += 1;
                }
            }
        }

        info!(
            "✓ 运行 #{} 完成: {} 篇文章, 成功 {}, 跳过 {}, 写入 {} 行",
            run.id, outcome.articles, outcome.articles_scored, outcome.articles_skipped, outcome.scores_written
        );
        Ok(outcome)
    }
}

fn days_i32(days: i64) -> Result<i32> {
    i32::try_from(days).map_err(|_| PipelineError::invalid("day offset is out of range"))
}

async fn score_article(
    url: &str,
    rows: &[CandidateRow],
    source: &dyn ArticleSource,
    scorer: &dyn ArticleScorer,
) -> std::result::Result<(ArticleText, ScoreResult), crate::scoring::ScoreError> {
    let stored = ArticleText {
        url: url.to_string(),
        title: rows.iter().find_map(|r| r.title.clone()),
        snippet: rows.iter().find_map(|r| r.snippet.clone()),
    };
    let text = source.load(url, &stored).await?;

    let mut companies: Vec<LinkedCompany> = rows
        .iter()
        .map(|r| LinkedCompany {
            cik: r.cik,
            name: r.company_title.clone(),
        })
        .collect();
    companies.sort_by_key(|c| c.cik);
    companies.dedup_by_key(|c| c.cik);

    let result = scorer.score(&text, &CompanyContext { companies }).await?;
    Ok((text, result))
}

fn score_rows(
    run_id: i32,
    experiment_id: i32,
    rows: &[CandidateRow],
    text: &ArticleText,
    result: &ScoreResult,
) -> Vec<article_score::Model> {
    let now = Utc::now().timestamp();
    rows.iter()
        .map(|r| article_score::Model {
            run_id,
            cik: r.cik,
            record_id: r.record_id.clone(),
            experiment_id,
            time_bucket: r.time_bucket.clone(),
            article_url: r.document_url.clone(),
            article_title: text.title.clone().or_else(|| r.title.clone()),
            score: result.score,
            reason: result.reason.clone(),
            label: Some(r.label),
            evaluated_at: now,
        })
        .collect()
}
