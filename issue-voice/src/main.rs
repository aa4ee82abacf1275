use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};

use issue_voice::listen::{self, ListenOptions};
use issue_voice::services::sample_issues;
use issue_voice::{HttpIssueService, InMemoryIssueService, IssueBoard, IssueService, VoiceConfig};

/// Issue tracker with a realtime voice-control session
#[derive(Parser, Debug)]
#[command(name = "issue-voice")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use a built-in in-memory data set instead of the issue service
    #[arg(long, global = true)]
    demo: bool,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List issues
    Issues {
        /// Only show issues assigned to NAME
        #[arg(short = 'a', long = "assignee", value_name = "NAME")]
        assignee: Option<String>,
    },

    /// Drive the issue board by voice until Ctrl-C
    Listen {
        /// Ogg/Opus file to send as microphone input (silence if omitted)
        #[arg(short = 'i', long = "input", value_name = "FILE")]
        input: Option<PathBuf>,

        /// Record the model's audio to an Ogg/Opus file
        #[arg(short = 'r', long = "record", value_name = "FILE")]
        record: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        tracing::info!("Loading configuration from {}", config_path.display());
        VoiceConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        VoiceConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    let service: Arc<dyn IssueService> = if cli.demo {
        Arc::new(InMemoryIssueService::with_issues(sample_issues()))
    } else {
        Arc::new(HttpIssueService::new(config.issue_service_url.clone()))
    };
    let board = IssueBoard::new(service);

    match cli.command {
        Commands::Issues { assignee } => {
            match assignee {
                Some(name) => board.filter_by_assignee(&name).await?,
                None => board.load_all().await?,
            }
            print_issues(&board);
        }
        Commands::Listen { input, record } => {
            board.load_all().await?;
            print_issues(&board);
            listen::run(&config, board, ListenOptions { input, record }).await?;
        }
    }

    Ok(())
}

fn print_issues(board: &IssueBoard) {
    let issues = board.issues();
    if issues.is_empty() {
        println!("No issues.");
        return;
    }

    println!("{:>5}  {:<12}  {:<12}  TITLE", "ID", "STATUS", "ASSIGNEE");
    for issue in issues {
        println!(
            "{:>5}  {:<12}  {:<12}  {}",
            issue.id,
            issue.status.label(),
            issue.assignee,
            issue.title
        );
    }
}
