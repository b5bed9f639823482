use crate::scoring::types::{ArticleScorer, ArticleText, CompanyContext, ScoreError, ScoreResult};
use async_trait::async_trait;
use log::warn;
use tokio::time::{sleep, Duration};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次失败后的等待：base * 2^(attempt-1)，封顶 max_delay
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }

    fn with_jitter(delay: Duration) -> Duration {
        // jitter: 0~20%
        let pct = (rand::random::<u8>() % 5) as u32 * 5;
        delay + delay * pct / 100
    }
}

/// 打分器外层的有限重试，只重试瞬时错误
pub struct RetryingScorer<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ArticleScorer> RetryingScorer<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<S: ArticleScorer> ArticleScorer for RetryingScorer<S> {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn score(
        &self,
        article: &ArticleText,
        context: &CompanyContext,
    ) -> Result<ScoreResult, ScoreError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.score(article, context).await {
                Ok(r) => return Ok(r),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = RetryPolicy::with_jitter(self.policy.backoff(attempt));
                    warn!(
                        "⚠ 打分失败 [{}/{}] {}: {}，{:?} 后重试",
                        attempt, attempts, article.url, e, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
