mod aggregate;
mod commands;
mod config;
mod error;
mod labels;
mod linker;
mod metrics;
mod model;
mod report;
mod scoring;
mod storage;
#[cfg(test)]
mod testkit;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use crate::commands::Cli;
use crate::config::AppConfig;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // .env 不存在时静默跳过
    let env_loaded = dotenv::dotenv().is_ok();

    env_logger::Builder::new()
        .target(env_logger::Target::Stderr)
        .filter_level(log::LevelFilter::Warn)
        .filter_module("edalpha", log::LevelFilter::Info)
        .filter_module("sqlx", log::LevelFilter::Error)
        .filter_module("sea_orm", log::LevelFilter::Error)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let app = AppConfig::from_env();
    if env_loaded {
        info!("✓ 已加载 .env");
    }

    let db = storage::establish_connection(&app.store)
        .await
        .with_context(|| format!("数据库连接失败: {}", app.store.database_url))?;

    let payload = match commands::dispatch(cli, &app, &db).await {
        Ok(v) => v,
        Err(e) => {
            error!("命令执行失败: {e:#}");
            return Err(e);
        }
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
