pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::Parser;

/// 命令列參數；篩選條件與服務設定放在 TOML 檔
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "iris-screen")]
#[command(about = "Stream CV screening results, compare candidates and export the session")]
pub struct CliArgs {
    #[arg(long, short, default_value = "iris.toml")]
    pub config: String,

    /// CV text files to submit
    #[arg(long, value_delimiter = ',')]
    pub documents: Vec<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    /// Overrides `[selection] top_n`
    #[arg(long)]
    pub top_n: Option<usize>,

    #[arg(long, help = "Skip deep analysis even when the config enables it")]
    pub no_deep_analysis: bool,

    #[arg(long, help = "Validate the config and documents without contacting the service")]
    pub dry_run: bool,

    #[arg(long, help = "Query the service health endpoint and exit")]
    pub check_health: bool,

    #[arg(long, help = "List archived sessions under the output path and exit")]
    pub list_sessions: bool,
}
