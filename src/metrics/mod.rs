pub mod calculator;
pub mod service;

pub use calculator::{compute_metrics, rank_companies, sanitize_k_values, MetricRow, RankedCompany, DEFAULT_K_VALUES};
pub use service::{MetricsCalculator, MetricsOutcome};
