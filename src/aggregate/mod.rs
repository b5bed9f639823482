pub mod aggregator;
pub mod service;

pub use aggregator::{aggregate_scores, CompanyAggregate};
pub use service::{AggregateOutcome, ScoreAggregator};
