use crate::error::{PipelineError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// SEC Central Index Key，全流程的公司标识
pub type Cik = i64;

pub const BUCKET_FORMAT: &str = "%Y%m%d%H%M%S";

/// 日期偏移（预测期、新闻回看）的上限，约一百年
pub const MAX_OFFSET_DAYS: i64 = 36_500;

/// 一份披露（8-K），item code 已从原始 items 字段解析
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingEvent {
    pub accession_number: String,
    pub form: String,
    pub filing_date: NaiveDate,
    pub primary_document: String,
    pub item_codes: BTreeSet<String>,
}

/// predict_date 之前的新闻回看窗口（天）。min_days_before 是最远端。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsWindow {
    pub min_days_before: i64,
    pub max_days_before: i64,
}

impl NewsWindow {
    pub fn new(min_days_before: i64, max_days_before: i64) -> Result<Self> {
        let w = Self {
            min_days_before,
            max_days_before,
        };
        w.validate()?;
        Ok(w)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_days_before < 0 || self.max_days_before < 0 {
            return Err(PipelineError::invalid(
                "min_days_before and max_days_before must be zero or positive",
            ));
        }
        if self.min_days_before > MAX_OFFSET_DAYS {
            return Err(PipelineError::invalid(format!(
                "min_days_before must not exceed {MAX_OFFSET_DAYS}"
            )));
        }
        if self.min_days_before < self.max_days_before {
            return Err(PipelineError::invalid(
                "min_days_before must be greater than or equal to max_days_before",
            ));
        }
        Ok(())
    }

    /// [predict - min 00:00:00, predict - max 23:59:59]
    pub fn buckets(&self, predict_date: NaiveDate) -> BucketWindow {
        let start = shift_days(predict_date, self.min_days_before.saturating_neg());
        let end = shift_days(predict_date, self.max_days_before.saturating_neg());
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
        BucketWindow {
            from: format_bucket(start.and_time(NaiveTime::default())),
            to: format_bucket(end.and_time(end_of_day)),
        }
    }
}

/// 偏移量截断到 ±MAX_OFFSET_DAYS，越过日历边界时停在 NaiveDate::MIN/MAX
pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    let days = days.clamp(-MAX_OFFSET_DAYS, MAX_OFFSET_DAYS);
    match date.checked_add_signed(Duration::days(days)) {
        Some(d) => d,
        None if days < 0 => NaiveDate::MIN,
        None => NaiveDate::MAX,
    }
}

/// 以 time_bucket 字符串表示的闭区间；YYYYMMDDHHMMSS 的字典序即时间序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketWindow {
    pub from: String,
    pub to: String,
}

impl BucketWindow {
    /// [from 00:00:00, to 23:59:59]
    pub fn for_dates(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(PipelineError::invalid(format!(
                "window start {from} is after window end {to}"
            )));
        }
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
        Ok(Self {
            from: format_bucket(from.and_time(NaiveTime::default())),
            to: format_bucket(to.and_time(end_of_day)),
        })
    }

    pub fn contains(&self, bucket: &str) -> bool {
        bucket >= self.from.as_str() && bucket <= self.to.as_str()
    }
}

pub fn format_bucket(ts: NaiveDateTime) -> String {
    ts.format(BUCKET_FORMAT).to_string()
}

/// 接受 YYYYMMDD 或 YYYY-MM-DD
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| PipelineError::invalid(format!("date must be YYYYMMDD, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn news_window_covers_whole_days() {
        let w = NewsWindow::new(31, 1).unwrap();
        let b = w.buckets(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(b.from, "20250531000000");
        assert_eq!(b.to, "20250630235959");
        assert!(b.contains("20250615120000"));
        assert!(!b.contains("20250701000000"));
    }

    #[test]
    fn date_window_spans_both_ends() {
        let from = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let w = BucketWindow::for_dates(from, to).unwrap();
        assert!(w.contains("20250601000000"));
        assert!(w.contains("20250602235959"));
        assert!(BucketWindow::for_dates(to, from).is_err());
    }

    #[test]
    fn news_window_rejects_inverted_bounds() {
        assert!(NewsWindow::new(1, 5).is_err());
        assert!(NewsWindow::new(-1, 0).is_err());
    }

    #[test]
    fn news_window_rejects_offsets_past_the_limit() {
        assert!(NewsWindow::new(MAX_OFFSET_DAYS, 1).is_ok());
        assert!(matches!(
            NewsWindow::new(1_000_000_000, 1),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unvalidated_window_still_yields_buckets() {
        let w = NewsWindow {
            min_days_before: i64::MAX,
            max_days_before: 1,
        };
        let b = w.buckets(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(b.to, "20250630235959");
        assert!(b.from < b.to);
    }

    #[test]
    fn shift_days_stops_at_calendar_edges() {
        let d = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(shift_days(d, 30), NaiveDate::from_ymd_opt(2025, 7, 31).unwrap());
        assert_eq!(shift_days(NaiveDate::MAX, 1), NaiveDate::MAX);
        assert_eq!(shift_days(NaiveDate::MIN, -1), NaiveDate::MIN);
    }

    #[test]
    fn parse_date_accepts_both_layouts() {
        let d = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(parse_date("20250701").unwrap(), d);
        assert_eq!(parse_date("2025-07-01").unwrap(), d);
        assert!(parse_date("07/01/2025").is_err());
    }
}
