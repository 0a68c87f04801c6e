use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "qna-eval",
    version,
    about = "Evaluation and smoke-test tooling for ChatQnA/DBQnA deployments"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Eval(EvalArgs),
    QuickTest(QuickTestArgs),
    ApiTest(ApiTestArgs),
    CleanupDashboard(CleanupDashboardArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EvalArgs {
    #[arg(long, default_value = "http://localhost:8888")]
    pub service_url: String,

    #[arg(long, default_value = "evaluation_results/chatqna_eval.json")]
    pub output: PathBuf,

    #[arg(long = "query")]
    pub queries: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub no_wait: bool,

    #[arg(long, default_value_t = 300)]
    pub max_wait_secs: u64,

    #[arg(long, default_value_t = 120)]
    pub query_timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct QuickTestArgs {
    #[arg(long, default_value = "http://localhost:8888")]
    pub service_url: String,

    #[arg(long, default_value = "evaluation_results/chatqna_quick_test.json")]
    pub output: PathBuf,

    #[arg(long, default_value_t = false)]
    pub no_wait: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ApiTestArgs {
    #[arg(default_value = "http://localhost")]
    pub base_url: String,

    #[arg(long, default_value = "postgres")]
    pub db_user: String,

    #[arg(long, default_value = "testpwd")]
    pub db_password: String,

    #[arg(long, default_value = "5442")]
    pub db_port: String,

    #[arg(long, default_value = "chinook")]
    pub db_name: String,
}

#[derive(Args, Debug, Clone)]
pub struct CleanupDashboardArgs {
    #[arg(default_value = "tgi_grafana.json")]
    pub input: PathBuf,

    #[arg(default_value = "tgi_grafana_cleaned.json")]
    pub output: PathBuf,
}
