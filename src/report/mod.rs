pub mod dto;
pub mod service;

pub use service::{ReportService, DEFAULT_EVIDENCE_PER_COMPANY, DEFAULT_RESULTS_TOP_K};
