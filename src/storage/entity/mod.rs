pub mod article_score;
pub mod article_text;
pub mod company;
pub mod company_link;
pub mod experiment;
pub mod filing;
pub mod label;
pub mod label_evidence;
pub mod news_record;
pub mod run_company_score;
pub mod run_metric;
pub mod scoring_run;

pub use article_score::Entity as ArticleScore;
pub use article_text::Entity as CachedArticle;
pub use company::Entity as Company;
pub use company_link::Entity as CompanyLink;
pub use experiment::Entity as Experiment;
pub use filing::Entity as Filing;
pub use label::Entity as Label;
pub use label_evidence::Entity as LabelEvidence;
pub use news_record::Entity as NewsRecord;
pub use run_company_score::Entity as RunCompanyScore;
pub use run_metric::Entity as RunMetric;
pub use scoring_run::Entity as ScoringRun;
