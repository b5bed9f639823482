use crate::commands::cli::ReportCommand;
use crate::error::PipelineError;
use crate::report::ReportService;
use crate::storage::repository::{ExperimentRepository, ScoreRepository};
use anyhow::Result;
use log::info;
use sea_orm::DatabaseConnection;
use serde_json::Value;

pub async fn handle(db: &DatabaseConnection, cmd: ReportCommand) -> Result<Value> {
    let value = match cmd {
        ReportCommand::Experiments => serde_json::to_value(ReportService::experiments(db).await?)?,
        ReportCommand::Labels(arg) => {
            serde_json::to_value(ReportService::labels(db, arg.experiment_id).await?)?
        }
        ReportCommand::RunMetrics(args) => {
            serde_json::to_value(ReportService::run_metrics(db, args.run_id, &args.k_values).await?)?
        }
        ReportCommand::Results(args) => serde_json::to_value(
            ReportService::results(db, args.experiment_id, args.run_id, args.top_k, args.evidence)
                .await?,
        )?,
    };
    Ok(value)
}

pub async fn delete_experiment(db: &DatabaseConnection, experiment_id: i32) -> Result<Value> {
    if ExperimentRepository::delete(db, experiment_id).await? == 0 {
        return Err(PipelineError::ExperimentNotFound(experiment_id).into());
    }
    info!("✓ 实验 #{experiment_id} 及其标签、打分运行已删除");
    Ok(serde_json::json!({ "deleted_experiment": experiment_id }))
}

pub async fn delete_run(db: &DatabaseConnection, run_id: i32) -> Result<Value> {
    if ScoreRepository::delete_run(db, run_id).await? == 0 {
        return Err(PipelineError::RunNotFound(run_id).into());
    }
    info!("✓ 打分运行 #{run_id} 已删除");
    Ok(serde_json::json!({ "deleted_run": run_id }))
}
