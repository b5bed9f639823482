pub mod article_repo;
pub mod company_repo;
pub mod experiment_repo;
pub mod filing_repo;
pub mod link_repo;
pub mod metric_repo;
pub mod score_repo;

pub use article_repo::ArticleRepository;
pub use company_repo::CompanyRepository;
pub use experiment_repo::{ExperimentRepository, NewExperiment};
pub use filing_repo::FilingRepository;
pub use link_repo::{LinkRepository, RecordCursor};
pub use metric_repo::MetricRepository;
pub use score_repo::{CandidateRow, NewScoringRun, ScoreRepository};
