use crate::error::{PipelineError, Result};
use crate::model::{parse_date, NewsWindow, MAX_OFFSET_DAYS};
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://edalpha.db?mode=rwc";
pub const DEFAULT_CONFIG_PATH: &str = "config/predict_config.json";
pub const DEFAULT_ITEM_CODES: [&str; 1] = ["2.01"];
pub const DEFAULT_HORIZON_DAYS: i64 = 30;
pub const DEFAULT_MIN_DAYS_BEFORE: i64 = 31;
pub const DEFAULT_MAX_DAYS_BEFORE: i64 = 1;
pub const DEFAULT_NEG_MULTIPLIER: u32 = 1;
pub const DEFAULT_LOG_MATCH_THRESHOLD: f64 = 0.2;
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout_secs: Option<u64>,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(10);
        Self {
            database_url,
            max_connections,
            min_connections: 1,
            idle_timeout_secs: Some(60),
        }
    }

    /// 单连接内存库：连接回收会丢库，所以不设 idle timeout
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_keys: Vec<String>,
    pub base_url: String,
    pub proxy: Option<String>,
    pub request_timeout_secs: u64,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let mut api_keys = std::env::var("OPENROUTER_API_KEYS")
            .map(|s| parse_key_list(&s))
            .unwrap_or_default();
        if api_keys.is_empty() {
            if let Ok(k) = std::env::var("OPENROUTER_API_KEY") {
                if !k.trim().is_empty() {
                    api_keys.push(k.trim().to_string());
                }
            }
        }
        let base_url = std::env::var("OPENROUTER_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OPENROUTER_BASE_URL.to_string());
        let proxy = std::env::var("LLM_PROXY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self {
            api_keys,
            base_url,
            proxy,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub user_agent: String,
}

impl AppConfig {
    /// 调用前应已加载 .env
    pub fn from_env() -> Self {
        let user_agent = std::env::var("EDALPHA_USER_AGENT")
            .ok()
            .or_else(|| {
                std::env::var("USER_EMAIL")
                    .ok()
                    .map(|email| format!("Ed-Alpha/0.1 ({email})"))
            })
            .unwrap_or_else(|| "Ed-Alpha/0.1".to_string());
        Self {
            store: StoreConfig::from_env(),
            llm: LlmConfig::from_env(),
            user_agent,
        }
    }
}

pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(|c| c == ',' || c == ';' || c == '\n' || c == '\t' || c == ' ')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NegativeStrategy {
    /// 从非正例候选中无放回均匀抽样
    #[default]
    Uniform,
    /// 按新闻量 ln(1+n) 最近邻配对
    NewsVolumeMatched { max_log_diff: f64 },
}

/// 实验配置：流程会读取的字段全部显式定型，其余原样透传到 `extra`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentConfig {
    pub predict_date: NaiveDate,
    pub horizon_days: i64,
    pub item_codes: Vec<String>,
    pub neg_multiplier: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub news_window: Option<NewsWindow>,
    #[serde(default)]
    pub max_positive_samples: Option<usize>,
    #[serde(default)]
    pub negative_strategy: NegativeStrategy,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExperimentConfig {
    pub fn new(predict_date: NaiveDate) -> Self {
        Self {
            predict_date,
            horizon_days: DEFAULT_HORIZON_DAYS,
            item_codes: DEFAULT_ITEM_CODES.iter().map(|s| s.to_string()).collect(),
            neg_multiplier: DEFAULT_NEG_MULTIPLIER,
            seed: None,
            news_window: None,
            max_positive_samples: None,
            negative_strategy: NegativeStrategy::Uniform,
            extra: Map::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon_days <= 0 {
            return Err(PipelineError::invalid("horizon_days must be positive"));
        }
        if self.horizon_days > MAX_OFFSET_DAYS {
            return Err(PipelineError::invalid(format!(
                "horizon_days must not exceed {MAX_OFFSET_DAYS}"
            )));
        }
        if self.seed.is_some_and(|s| i64::try_from(s).is_err()) {
            return Err(PipelineError::invalid(format!(
                "seed must not exceed {}",
                i64::MAX
            )));
        }
        if self.trigger_codes().is_empty() {
            return Err(PipelineError::invalid("at least one item code is required"));
        }
        if let Some(w) = &self.news_window {
            w.validate()?;
        }
        if self.max_positive_samples == Some(0) {
            return Err(PipelineError::invalid(
                "max_positive_samples must be positive when provided",
            ));
        }
        if let NegativeStrategy::NewsVolumeMatched { max_log_diff } = self.negative_strategy {
            if max_log_diff.is_nan() || max_log_diff <= 0.0 {
                return Err(PipelineError::invalid("max_log_diff must be positive"));
            }
        }
        Ok(())
    }

    pub fn trigger_codes(&self) -> BTreeSet<String> {
        self.item_codes
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// 配置文件（config/predict_config.json）的原始形态，全部可选
#[derive(Debug, Default, Deserialize)]
pub struct ExperimentFile {
    pub predict_date: Option<String>,
    pub horizon_days: Option<i64>,
    pub item_codes: Option<Vec<String>>,
    pub neg_multiplier: Option<u32>,
    pub seed: Option<u64>,
    pub min_days_before: Option<i64>,
    pub max_days_before: Option<i64>,
    pub max_positive_samples: Option<usize>,
    pub negative_strategy: Option<NegativeStrategy>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExperimentFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("配置文件 {} 不存在，使用命令行参数与默认值", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// 命令行覆盖项，优先级：命令行 > 配置文件 > 默认值
#[derive(Debug, Default, Clone)]
pub struct ExperimentOverrides {
    pub predict_date: Option<String>,
    pub horizon_days: Option<i64>,
    pub item_codes: Option<Vec<String>>,
    pub neg_multiplier: Option<u32>,
    pub seed: Option<u64>,
    pub min_days_before: Option<i64>,
    pub max_days_before: Option<i64>,
    pub max_positive_samples: Option<usize>,
    pub match_news_volume: bool,
}

pub fn resolve_experiment_config(
    file: ExperimentFile,
    cli: ExperimentOverrides,
) -> Result<ExperimentConfig> {
    let raw_date = cli
        .predict_date
        .or(file.predict_date)
        .ok_or_else(|| PipelineError::invalid("predict_date must be provided via CLI or config"))?;
    let mut cfg = ExperimentConfig::new(parse_date(&raw_date)?);

    if let Some(h) = cli.horizon_days.or(file.horizon_days) {
        cfg.horizon_days = h;
    }
    if let Some(codes) = cli.item_codes.or(file.item_codes) {
        let codes: Vec<String> = codes
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if !codes.is_empty() {
            cfg.item_codes = codes;
        }
    }
    if let Some(m) = cli.neg_multiplier.or(file.neg_multiplier) {
        cfg.neg_multiplier = m;
    }
    cfg.seed = cli.seed.or(file.seed);
    cfg.max_positive_samples = cli.max_positive_samples.or(file.max_positive_samples);

    let min_days = cli.min_days_before.or(file.min_days_before);
    let max_days = cli.max_days_before.or(file.max_days_before);
    if min_days.is_some() || max_days.is_some() {
        cfg.news_window = Some(NewsWindow::new(
            min_days.unwrap_or(DEFAULT_MIN_DAYS_BEFORE),
            max_days.unwrap_or(DEFAULT_MAX_DAYS_BEFORE),
        )?);
    }

    cfg.negative_strategy = if cli.match_news_volume {
        NegativeStrategy::NewsVolumeMatched {
            max_log_diff: DEFAULT_LOG_MATCH_THRESHOLD,
        }
    } else {
        file.negative_strategy.unwrap_or_default()
    };
    if matches!(cfg.negative_strategy, NegativeStrategy::NewsVolumeMatched { .. })
        && cfg.news_window.is_none()
    {
        // 新闻量配对需要统计窗口
        cfg.news_window = Some(NewsWindow::new(
            DEFAULT_MIN_DAYS_BEFORE,
            DEFAULT_MAX_DAYS_BEFORE,
        )?);
    }

    cfg.extra = file.extra;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_file_and_file_overrides_defaults() {
        let file: ExperimentFile = serde_json::from_str(
            r#"{"predict_date":"20250701","horizon_days":14,"item_codes":["1.01","2.01"],
                "seed":7,"notes":"baseline"}"#,
        )
        .unwrap();
        let cli = ExperimentOverrides {
            horizon_days: Some(45),
            neg_multiplier: Some(2),
            ..Default::default()
        };
        let cfg = resolve_experiment_config(file, cli).unwrap();
        assert_eq!(cfg.predict_date, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(cfg.horizon_days, 45);
        assert_eq!(cfg.neg_multiplier, 2);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.item_codes, vec!["1.01", "2.01"]);
        assert_eq!(cfg.news_window, None);
        assert_eq!(cfg.extra.get("notes"), Some(&Value::from("baseline")));
    }

    #[test]
    fn missing_predict_date_is_rejected() {
        let err = resolve_experiment_config(ExperimentFile::default(), Default::default());
        assert!(matches!(err, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn news_matching_implies_a_news_window() {
        let cli = ExperimentOverrides {
            predict_date: Some("2025-07-01".into()),
            match_news_volume: true,
            ..Default::default()
        };
        let cfg = resolve_experiment_config(ExperimentFile::default(), cli).unwrap();
        assert_eq!(cfg.news_window, Some(NewsWindow::new(31, 1).unwrap()));
        assert!(matches!(
            cfg.negative_strategy,
            NegativeStrategy::NewsVolumeMatched { .. }
        ));
    }

    #[test]
    fn config_round_trips_with_pass_through_keys() {
        let mut cfg = ExperimentConfig::new(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        cfg.extra.insert("owner".into(), Value::from("research"));
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ExperimentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn blank_item_codes_fail_validation() {
        let mut cfg = ExperimentConfig::new(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        cfg.item_codes = vec!["  ".into()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn horizon_beyond_offset_limit_is_rejected() {
        let mut cfg = ExperimentConfig::new(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        cfg.horizon_days = MAX_OFFSET_DAYS;
        assert!(cfg.validate().is_ok());
        cfg.horizon_days = 1_000_000_000;
        assert!(matches!(cfg.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn huge_news_window_is_rejected_before_resolving() {
        let cli = ExperimentOverrides {
            predict_date: Some("2025-07-01".into()),
            min_days_before: Some(1_000_000_000),
            ..Default::default()
        };
        let err = resolve_experiment_config(ExperimentFile::default(), cli);
        assert!(matches!(err, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn seed_must_fit_the_stored_column() {
        let mut cfg = ExperimentConfig::new(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        cfg.seed = Some(i64::MAX as u64);
        assert!(cfg.validate().is_ok());
        cfg.seed = Some(u64::MAX);
        assert!(matches!(cfg.validate(), Err(PipelineError::InvalidConfig(_))));
    }
}
