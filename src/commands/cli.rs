use crate::config::DEFAULT_CONFIG_PATH;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// 8-K 事件预测的离线评估流水线
#[derive(Parser, Debug)]
#[command(name = "edalpha")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 实验参数 JSON 文件（不存在时忽略）
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 建表（连接时也会自动执行）
    InitDb,
    /// 创建实验并生成正负标签；指定 --experiment-id 时重新生成
    Labels(LabelsArgs),
    /// 把新闻记录关联到公司
    Link(LinkArgs),
    /// 对候选文章打分，生成一次 scoring run
    Score(ScoreArgs),
    /// 把文章分聚合为公司分
    Aggregate(AggregateArgs),
    /// 计算 precision/recall@K
    Metrics(MetricsArgs),
    /// 只读查询
    #[command(subcommand)]
    Report(ReportCommand),
    /// 删除实验及其全部下游数据
    DeleteExperiment(ExperimentIdArg),
    /// 删除一次 scoring run 及其下游数据
    DeleteRun(RunIdArg),
}

#[derive(Args, Debug)]
pub struct ExperimentIdArg {
    #[arg(long)]
    pub experiment_id: i32,
}

#[derive(Args, Debug)]
pub struct RunIdArg {
    #[arg(long)]
    pub run_id: i32,
}

#[derive(Args, Debug, Default)]
pub struct LabelsArgs {
    /// 重新生成已有实验的标签（忽略其余参数）
    #[arg(long)]
    pub experiment_id: Option<i32>,
    /// YYYYMMDD
    #[arg(long)]
    pub predict_date: Option<String>,
    #[arg(long)]
    pub horizon_days: Option<i64>,
    /// 逗号分隔，例如 2.01,1.01
    #[arg(long, value_delimiter = ',')]
    pub item_codes: Option<Vec<String>>,
    #[arg(long)]
    pub neg_multiplier: Option<u32>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// 新闻窗口最远端（predict_date 之前的天数）
    #[arg(long)]
    pub min_days_before: Option<i64>,
    #[arg(long)]
    pub max_days_before: Option<i64>,
    #[arg(long)]
    pub max_positive_samples: Option<usize>,
    /// 按新闻量配对负例
    #[arg(long)]
    pub match_news_volume: bool,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// YYYYMMDD，含当天
    #[arg(long)]
    pub from: Option<String>,
    /// YYYYMMDD，含当天
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long, default_value_t = crate::linker::service::DEFAULT_LINK_BATCH_SIZE)]
    pub batch_size: u64,
    /// 额外的屏蔽组织名，可重复
    #[arg(long = "block")]
    pub blocked: Vec<String>,
    /// 不使用内置屏蔽列表
    #[arg(long)]
    pub no_default_block: bool,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[arg(long)]
    pub experiment_id: i32,
    #[arg(long, default_value_t = crate::config::DEFAULT_MIN_DAYS_BEFORE)]
    pub min_days_before: i64,
    #[arg(long, default_value_t = crate::config::DEFAULT_MAX_DAYS_BEFORE)]
    pub max_days_before: i64,
    /// 并发上限
    #[arg(long, default_value_t = crate::scoring::runner::DEFAULT_SCORING_BATCH_SIZE)]
    pub batch_size: usize,
    /// OpenRouter 模型名
    #[arg(long)]
    pub model: String,
    #[arg(long)]
    pub run_label: Option<String>,
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,
    /// 模型不支持 response_format 时使用
    #[arg(long)]
    pub no_json_format: bool,
    #[arg(long)]
    pub thinking: bool,
}

#[derive(Args, Debug)]
pub struct AggregateArgs {
    #[arg(long)]
    pub run_id: i32,
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct MetricsArgs {
    #[arg(long)]
    pub run_id: i32,
    /// 逗号分隔；缺省为 10,20,...,100
    #[arg(long = "k", value_delimiter = ',', allow_negative_numbers = true)]
    pub k_values: Vec<i64>,
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// 实验列表及其 run id
    Experiments,
    /// 实验的标签集合
    Labels(ExperimentIdArg),
    /// 已保存的指标
    RunMetrics(RunMetricsArgs),
    /// 排名靠前的公司及证据
    Results(ResultsArgs),
}

#[derive(Args, Debug)]
pub struct RunMetricsArgs {
    #[arg(long)]
    pub run_id: i32,
    #[arg(long = "k", value_delimiter = ',')]
    pub k_values: Vec<u32>,
}

#[derive(Args, Debug)]
pub struct ResultsArgs {
    #[arg(long)]
    pub experiment_id: i32,
    #[arg(long)]
    pub run_id: i32,
    #[arg(long, default_value_t = crate::report::DEFAULT_RESULTS_TOP_K)]
    pub top_k: usize,
    #[arg(long, default_value_t = crate::report::DEFAULT_EVIDENCE_PER_COMPANY)]
    pub evidence: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_labels_overrides() {
        let cli = Cli::parse_from([
            "edalpha",
            "labels",
            "--predict-date",
            "20250701",
            "--item-codes",
            "2.01,1.01",
            "--match-news-volume",
        ]);
        let Command::Labels(args) = cli.command else {
            panic!("expected labels");
        };
        assert_eq!(args.item_codes, Some(vec!["2.01".to_string(), "1.01".to_string()]));
        assert!(args.match_news_volume);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn parses_metrics_k_list() {
        let cli = Cli::parse_from(["edalpha", "metrics", "--run-id", "3", "--k", "5,50"]);
        let Command::Metrics(args) = cli.command else {
            panic!("expected metrics");
        };
        assert_eq!(args.run_id, 3);
        assert_eq!(args.k_values, vec![5, 50]);
    }
}
