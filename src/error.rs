use crate::scoring::ScoreError;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("scorer error: {0}")]
    Scorer(#[from] ScoreError),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("experiment {0} not found")]
    ExperimentNotFound(i32),
    #[error("scoring run {0} not found")]
    RunNotFound(i32),
    #[error("scoring run {run_id} belongs to experiment {actual}, not {expected}")]
    RunExperimentMismatch {
        run_id: i32,
        expected: i32,
        actual: i32,
    },
    #[error("experiment {0} has no labels; run `labels` first")]
    MissingLabels(i32),
}

impl PipelineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
