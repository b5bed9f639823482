use crate::model::Cik;
use async_trait::async_trait;
use serde::Serialize;

/// 送去打分的文章文本
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArticleText {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkedCompany {
    pub cik: Cik,
    pub name: Option<String>,
}

/// 与文章关联的公司（同一 URL 只打一次分，所以可能有多家）
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompanyContext {
    pub companies: Vec<LinkedCompany>,
}

impl CompanyContext {
    pub fn names(&self) -> Vec<String> {
        self.companies
            .iter()
            .map(|c| match &c.name {
                Some(n) if !n.trim().is_empty() => n.trim().to_string(),
                _ => format!("CIK {}", c.cik),
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScoreResult {
    pub score: i32,
    pub reason: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("missing env {0}")]
    MissingEnv(&'static str),
    #[error("http error: {0}")]
    Http(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ScoreError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScoreError::Http(_) | ScoreError::RateLimited | ScoreError::InvalidResponse(_)
        )
    }
}

#[async_trait]
pub trait ArticleScorer: Send + Sync {
    fn model_name(&self) -> &str;

    async fn score(
        &self,
        article: &ArticleText,
        context: &CompanyContext,
    ) -> Result<ScoreResult, ScoreError>;
}
