pub mod matcher;
pub mod service;

pub use matcher::{normalize_text, CompanyIndex};
pub use service::{CompanyLinker, LinkConfig, LinkStats, NewsIndex, NewsItem, StoreNewsIndex};
