pub mod article;
pub mod openrouter;
pub mod parser;
pub mod prompt;
pub mod retry;
pub mod runner;
pub mod types;

pub use article::{ArticleSource, CachedArticleSource, HttpArticleSource};
pub use openrouter::{OpenRouterScorer, ReasoningMode};
pub use retry::{RetryPolicy, RetryingScorer};
pub use runner::{RunOutcome, ScoringRequest, ScoringRunner};
pub use types::{ArticleScorer, ArticleText, CompanyContext, LinkedCompany, ScoreError, ScoreResult};

use std::time::Duration;

/// LLM_PROXY 没写协议时按 socks5h 处理
pub(crate) fn build_http_client(
    proxy: Option<&str>,
    timeout_secs: u64,
    user_agent: Option<&str>,
) -> Result<reqwest::Client, ScoreError> {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs));
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua.to_string());
    }

    if let Some(raw) = proxy {
        let t = raw.trim();
        if !t.is_empty() {
            let url = if t.contains("://") {
                t.to_string()
            } else {
                format!("socks5h://{}", t)
            };
            let proxy = reqwest::Proxy::all(&url).map_err(|e| ScoreError::Http(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
    }

    builder.build().map_err(|e| ScoreError::Http(e.to_string()))
}
