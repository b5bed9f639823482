use crate::aggregate::ScoreAggregator;
use crate::commands::cli::{AggregateArgs, LabelsArgs, LinkArgs, MetricsArgs, ScoreArgs};
use crate::config::{resolve_experiment_config, AppConfig, ExperimentFile, ExperimentOverrides};
use crate::labels::generator::horizon_bounds;
use crate::labels::{LabelService, StoreFilingSource};
use crate::linker::matcher::DEFAULT_BLOCKED_ORGANIZATIONS;
use crate::linker::{CompanyLinker, LinkConfig, StoreNewsIndex};
use crate::metrics::{sanitize_k_values, MetricsCalculator};
use crate::model::{parse_date, BucketWindow, NewsWindow};
use crate::scoring::{
    CachedArticleSource, HttpArticleSource, OpenRouterScorer, ReasoningMode, RetryPolicy, RetryingScorer, ScoringRequest,
    ScoringRunner,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use std::path::Path;

pub async fn labels(db: &DatabaseConnection, config_path: &Path, args: LabelsArgs) -> Result<Value> {
    let experiment_id = match args.experiment_id {
        Some(id) => {
            info!("重新生成实验 #{id} 的标签");
            id
        }
        None => {
            let file = ExperimentFile::load(config_path)
                .with_context(|| format!("读取配置文件失败: {}", config_path.display()))?;
            let overrides = ExperimentOverrides {
                predict_date: args.predict_date,
                horizon_days: args.horizon_days,
                item_codes: args.item_codes,
                neg_multiplier: args.neg_multiplier,
                seed: args.seed,
                min_days_before: args.min_days_before,
                max_days_before: args.max_days_before,
                max_positive_samples: args.max_positive_samples,
                match_news_volume: args.match_news_volume,
            };
            let cfg = resolve_experiment_config(file, overrides)?;
            LabelService::create_experiment(db, &cfg).await?
        }
    };

    let (_, cfg) = LabelService::load(db, experiment_id).await?;
    let (after, until) = horizon_bounds(cfg.predict_date, cfg.horizon_days);
    let source = StoreFilingSource::preload(db, after, until).await?;
    let outcome = LabelService::generate(db, experiment_id, &source)
        .await
        .with_context(|| format!("实验 #{experiment_id} 标签生成失败"))?;
    Ok(serde_json::to_value(outcome)?)
}

pub async fn link(db: &DatabaseConnection, args: LinkArgs) -> Result<Value> {
    let window = match (args.from.as_deref(), args.to.as_deref()) {
        (None, None) => None,
        (from, to) => {
            let from = date_or(from, 1000, 1, 1)?;
            let to = date_or(to, 9999, 12, 31)?;
            Some(BucketWindow::for_dates(from, to)?)
        }
    };

    let mut blocked: Vec<String> = if args.no_default_block {
        Vec::new()
    } else {
        DEFAULT_BLOCKED_ORGANIZATIONS.iter().map(|s| s.to_string()).collect()
    };
    blocked.extend(args.blocked);

    let cfg = LinkConfig {
        batch_size: args.batch_size,
        window,
        blocked,
    };
    let stats = CompanyLinker::run(db, &StoreNewsIndex::new(db), &cfg).await?;
    Ok(serde_json::to_value(stats)?)
}

/// 只给一端时另一端取四位年份范围的极值，保证 bucket 字符串可比较
fn date_or(raw: Option<&str>, y: i32, m: u32, d: u32) -> Result<NaiveDate> {
    match raw {
        Some(r) => Ok(parse_date(r)?),
        None => NaiveDate::from_ymd_opt(y, m, d).context("invalid fallback date"),
    }
}

pub async fn score(db: &DatabaseConnection, app: &AppConfig, args: ScoreArgs) -> Result<Value> {
    let model = args.model.trim();
    if model.is_empty() {
        anyhow::bail!("--model 不能为空");
    }
    let reasoning = if args.thinking {
        ReasoningMode::Thinking
    } else {
        ReasoningMode::None
    };
    let scorer = OpenRouterScorer::new(&app.llm, model)
        .context("初始化 OpenRouter 失败")?
        .with_json_format(!args.no_json_format)
        .with_reasoning(reasoning);
    let scorer = RetryingScorer::new(
        scorer,
        RetryPolicy {
            max_attempts: args.max_attempts,
            ..RetryPolicy::default()
        },
    );
    let fetcher = HttpArticleSource::new(
        app.llm.proxy.as_deref(),
        app.llm.request_timeout_secs,
        &app.user_agent,
    )?;
    let source = CachedArticleSource::new(db.clone(), fetcher);

    let req = ScoringRequest {
        experiment_id: args.experiment_id,
        window: NewsWindow::new(args.min_days_before, args.max_days_before)?,
        batch_size: args.batch_size,
        run_label: args.run_label,
    };
    let outcome = ScoringRunner::run(db, &req, &source, &scorer).await?;
    Ok(serde_json::to_value(outcome)?)
}

pub async fn aggregate(db: &DatabaseConnection, args: AggregateArgs) -> Result<Value> {
    let outcome = ScoreAggregator::run(db, args.run_id, args.dry_run).await?;
    Ok(serde_json::to_value(outcome)?)
}

pub async fn metrics(db: &DatabaseConnection, args: MetricsArgs) -> Result<Value> {
    let k_values = sanitize_k_values(&args.k_values)?;
    let outcome = MetricsCalculator::run(db, args.run_id, &k_values, args.dry_run).await?;
    Ok(serde_json::to_value(outcome)?)
}
