use crate::config::StoreConfig;
use crate::storage::entity::{
    ArticleScore, CachedArticle, Company, CompanyLink, Experiment, Filing, Label, LabelEvidence, NewsRecord,
    RunCompanyScore, RunMetric, ScoringRun,
};
use log::info;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
    Statement,
};
use std::time::Duration;

pub async fn establish_connection(cfg: &StoreConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(cfg.database_url.to_owned());
    opt.max_connections(cfg.max_connections)
        .min_connections(cfg.min_connections)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Info);
    if let Some(secs) = cfg.idle_timeout_secs {
        opt.idle_timeout(Duration::from_secs(secs));
    }

    let db = Database::connect(opt).await?;
    init_schema(&db).await?;
    info!("数据库连接已建立: {}", cfg.database_url);
    Ok(db)
}

/// 启用 WAL + 外键，并按依赖顺序建表（父表在前）
pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    // 内存库会返回 "memory"，忽略即可
    db.execute(Statement::from_string(
        backend,
        "PRAGMA journal_mode=WAL;".to_string(),
    ))
    .await?;
    // 级联删除依赖外键
    db.execute(Statement::from_string(
        backend,
        "PRAGMA foreign_keys=ON;".to_string(),
    ))
    .await?;

    create_table(db, Company).await?;
    create_table(db, Filing).await?;
    create_table(db, NewsRecord).await?;
    create_table(db, CompanyLink).await?;
    create_table(db, Experiment).await?;
    create_table(db, Label).await?;
    create_table(db, LabelEvidence).await?;
    create_table(db, ScoringRun).await?;
    create_table(db, ArticleScore).await?;
    create_table(db, RunCompanyScore).await?;
    create_table(db, RunMetric).await?;
    create_table(db, CachedArticle).await?;

    for ddl in [
        "CREATE INDEX IF NOT EXISTS idx_company_filings_date ON company_filings(filing_date);",
        "CREATE INDEX IF NOT EXISTS idx_company_links_cik_time ON company_links(cik, time_bucket);",
        "CREATE INDEX IF NOT EXISTS idx_article_scores_run_url ON article_scores(run_id, article_url);",
        "CREATE INDEX IF NOT EXISTS idx_scoring_runs_experiment ON scoring_runs(experiment_id);",
    ] {
        db.execute(Statement::from_string(backend, ddl.to_string()))
            .await?;
    }

    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let stmt = builder.build(schema.create_table_from_entity(entity).if_not_exists());
    db.execute(stmt).await?;
    Ok(())
}
