pub mod cli;
pub mod pipeline;
pub mod report;

pub use cli::{Cli, Command};

use crate::config::AppConfig;
use anyhow::Result;
use sea_orm::DatabaseConnection;
use serde_json::Value;

/// 执行子命令，返回要打印到 stdout 的 JSON
pub async fn dispatch(cli: Cli, app: &AppConfig, db: &DatabaseConnection) -> Result<Value> {
    match cli.command {
        Command::InitDb => Ok(serde_json::json!({
            "status": "ok",
            "database_url": app.store.database_url,
        })),
        Command::Labels(args) => pipeline::labels(db, &cli.config, args).await,
        Command::Link(args) => pipeline::link(db, args).await,
        Command::Score(args) => pipeline::score(db, app, args).await,
        Command::Aggregate(args) => pipeline::aggregate(db, args).await,
        Command::Metrics(args) => pipeline::metrics(db, args).await,
        Command::Report(cmd) => report::handle(db, cmd).await,
        Command::DeleteExperiment(arg) => report::delete_experiment(db, arg.experiment_id).await,
        Command::DeleteRun(arg) => report::delete_run(db, arg.run_id).await,
    }
}
