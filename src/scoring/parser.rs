use crate::scoring::types::{ScoreError, ScoreResult};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 5;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)```").expect("fence pattern"))
}

/// ```json ... ``` 包裹时取内部内容
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    fence_re()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed)
}

pub fn parse_score_response(content: &str) -> Result<ScoreResult, ScoreError> {
    let body = strip_code_fence(content);
    let parsed: Value = serde_json::from_str(body).map_err(|e| {
        ScoreError::InvalidResponse(format!("content is not valid JSON: {e}"))
    })?;

    let score = match parsed.get("score") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ScoreError::InvalidResponse("missing integer field 'score'".to_string()))?;
    if !(MIN_SCORE as i64..=MAX_SCORE as i64).contains(&score) {
        return Err(ScoreError::InvalidResponse(format!("score {score} out of range")));
    }

    let reason = match parsed.get("reason") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    if reason.is_empty() {
        return Err(ScoreError::InvalidResponse(
            "'reason' must be a non-empty string".to_string(),
        ));
    }

    Ok(ScoreResult {
        score: score as i32,
        reason,
    })
}
