use crate::config::LlmConfig;
use crate::scoring::build_http_client;
use crate::scoring::parser::parse_score_response;
use crate::scoring::prompt::{build_user_prompt, SYSTEM_PROMPT};
use crate::scoring::types::{ArticleScorer, ArticleText, CompanyContext, ScoreError, ScoreResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReasoningMode {
    #[default]
    None,
    Thinking,
}

#[derive(Clone)]
pub struct OpenRouterScorer {
    client: reqwest::Client,
    base_url: String,
    api_keys: Vec<String>,
    index: Arc<AtomicUsize>,
    model: String,
    json_format: bool,
    reasoning: ReasoningMode,
}

impl OpenRouterScorer {
    pub fn new(cfg: &LlmConfig, model: impl Into<String>) -> Result<Self, ScoreError> {
        if cfg.api_keys.is_empty() {
            return Err(ScoreError::MissingEnv("OPENROUTER_API_KEY"));
        }
        Ok(Self {
            client: build_http_client(cfg.proxy.as_deref(), cfg.request_timeout_secs, None)?,
            base_url: cfg.base_url.clone(),
            api_keys: cfg.api_keys.clone(),
            index: Arc::new(AtomicUsize::new(0)),
            model: model.into(),
            json_format: true,
            reasoning: ReasoningMode::None,
        })
    }

    /// 部分模型不支持 response_format
    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    pub fn with_reasoning(mut self, mode: ReasoningMode) -> Self {
        self.reasoning = mode;
        self
    }

    fn next_key(&self) -> &str {
        let i = self.index.fetch_add(1, Ordering::Relaxed);
        &self.api_keys[i % self.api_keys.len()]
    }

    fn request_body(&self, article: &ArticleText, context: &CompanyContext) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_user_prompt(article, context)}
            ]
        });
        if self.json_format {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        if self.reasoning == ReasoningMode::Thinking {
            body["reasoning"] = serde_json::json!({"effort": "medium"});
        }
        body
    }
}

/// 兼容 message.content 为字符串或分段数组，以及顶层 output_text
pub(crate) fn extract_content(v: &Value, raw: &str) -> Result<String, ScoreError> {
    if let Some(Value::String(s)) = v.get("output_text") {
        return Ok(s.clone());
    }
    let choice0 = v
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| ScoreError::InvalidResponse(format!("missing choices[0], raw={raw}")))?;
    let content = choice0
        .get("message")
        .and_then(|m| m.get("content"))
        .or_else(|| choice0.get("content"));

    match content {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Array(arr)) => {
            let parts: Vec<&str> = arr
                .iter()
                .filter_map(|it| it.get("text").and_then(|x| x.as_str()).or_else(|| it.as_str()))
                .collect();
            Ok(parts.join("\n"))
        }
        Some(_) => Err(ScoreError::InvalidResponse(format!(
            "unexpected content type, raw={raw}"
        ))),
        None => match choice0.get("text") {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(ScoreError::InvalidResponse(format!(
                "missing content/text in choices[0], raw={raw}"
            ))),
        },
    }
}

#[async_trait]
impl ArticleScorer for OpenRouterScorer {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn score(
        &self,
        article: &ArticleText,
        context: &CompanyContext,
    ) -> Result<ScoreResult, ScoreError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = self.request_body(article, context);

        let resp = self
            .client
            .post(url)
            .bearer_auth(self.next_key())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ScoreError::Http(e.to_string()))?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(ScoreError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => return Err(ScoreError::RateLimited),
            _ => {}
        }

        let status = resp.status();
        let raw = resp
            .text()
            .await
            .map_err(|e| ScoreError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(ScoreError::Http(format!("{} {}", status.as_u16(), raw)));
        }

        let v: Value = serde_json::from_str(&raw)
            .map_err(|e| ScoreError::InvalidResponse(format!("json parse failed: {e}, raw={raw}")))?;
        let content = extract_content(&v, &raw)?;
        parse_score_response(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(keys: &[&str]) -> LlmConfig {
        LlmConfig {
            api_keys: keys.iter().map(|k| k.to_string()).collect(),
            base_url: "https://openrouter.test/api/v1".into(),
            proxy: None,
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn missing_keys_are_reported() {
        let err = OpenRouterScorer::new(&cfg(&[]), "m").err();
        assert_eq!(err, Some(ScoreError::MissingEnv("OPENROUTER_API_KEY")));
    }

    #[test]
    fn keys_rotate_round_robin() {
        let s = OpenRouterScorer::new(&cfg(&["a", "b"]), "m").unwrap();
        let seen: Vec<String> = (0..3).map(|_| s.next_key().to_string()).collect();
        assert_eq!(seen, vec!["a", "b", "a"]);
    }

    #[test]
    fn request_body_carries_optional_fields() {
        let article = ArticleText {
            url: "https://x".into(),
            title: Some("t".into()),
            snippet: None,
        };
        let s = OpenRouterScorer::new(&cfg(&["k"]), "openai/gpt-4o-mini")
            .unwrap()
            .with_reasoning(ReasoningMode::Thinking);
        let body = s.request_body(&article, &CompanyContext::default());
        assert_eq!(body["model"], "openai/gpt-4o-mini");
        assert_eq!(body["temperature"], 0);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["reasoning"]["effort"], "medium");

        let plain = s.with_json_format(false).with_reasoning(ReasoningMode::None);
        let body = plain.request_body(&article, &CompanyContext::default());
        assert!(body.get("response_format").is_none());
        assert!(body.get("reasoning").is_none());
    }

    #[test]
    fn content_is_extracted_from_array_parts() {
        let raw = r#"{"choices":[{"message":{"content":[{"type":"text","text":"{\"score\":3,"},{"type":"text","text":"\"reason\":\"r\"}"}]}}]}"#;
        let v: Value = serde_json::from_str(raw).unwrap();
        let content = extract_content(&v, raw).unwrap();
        assert_eq!(content, "{\"score\":3,\n\"reason\":\"r\"}");
        assert_eq!(parse_score_response(&content).unwrap().score, 3);
    }
}
