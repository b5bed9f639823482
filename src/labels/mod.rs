pub mod generator;
pub mod item_codes;
pub mod service;

pub use generator::{plan_labels, LabelPlan, TriggerEvidence};
pub use service::{FilingSource, LabelOutcome, LabelService, StoreFilingSource};
