mod commands;
mod docs_version;
mod snippets;
mod verify;

use academy_common::config::Settings;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "academy-cli")]
#[command(about = "Academy CLI - Check lesson content, snippets and exercise solutions", long_about = None)]
struct Cli {
    /// Content directory (defaults to CONTENT_DIR or ./content)
    #[arg(long, global = true)]
    content_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check lesson files, frontmatter, prerequisites and exercise references
    VerifyContent,

    /// Run every <CodeCell> of every lesson
    RunSnippets {
        /// Per-cell timeout in seconds
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },

    /// Validate each exercise's reference solution
    CheckSolutions,

    /// Validate a file against one exercise and print the verdict
    Validate {
        /// Module id (e.g. 01-tensors)
        #[arg(short, long)]
        module: String,

        /// Exercise id within the module
        #[arg(short, long)]
        exercise: String,

        /// File containing the code to validate
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Point lesson frontmatter and docs links at a PyTorch version
    UpdateDocs {
        /// PyTorch version (e.g. 2.3)
        #[arg(short, long)]
        version: String,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    let content_dir = cli
        .content_dir
        .unwrap_or_else(|| settings.content_dir.clone());

    let ok = match cli.command {
        Commands::VerifyContent => commands::verify(&content_dir)?,
        Commands::RunSnippets { timeout } => {
            commands::run_snippets(&settings, &content_dir, timeout).await?
        }
        Commands::CheckSolutions => commands::check_solutions(&settings, &content_dir).await?,
        Commands::Validate {
            module,
            exercise,
            file,
        } => commands::validate_file(&settings, &content_dir, &module, &exercise, &file).await?,
        Commands::UpdateDocs { version } => commands::update_docs(&content_dir, &version)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
