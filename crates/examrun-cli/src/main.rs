//! examrun CLI — timed TOPIK practice exams in the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;
mod display;
mod prompt;

#[derive(Parser)]
#[command(name = "examrun", version, about = "Timed TOPIK practice exams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take an exam
    Take {
        /// Exam id as listed by `examrun list`
        #[arg(long)]
        exam_id: String,

        /// Exam data file (defaults to `exams_path` from the config)
        #[arg(long)]
        exams: Option<PathBuf>,

        /// Seconds allowed instead of the level/skill default; 0 runs untimed
        #[arg(long)]
        duration: Option<i64>,

        /// Never save the result and never ask for a login
        #[arg(long)]
        no_save: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Replay a stored attempt with its answers and the answer key
    Review {
        /// Stored attempt id
        #[arg(long)]
        session_id: String,

        /// Exam the attempt is expected to belong to
        #[arg(long)]
        exam_id: String,

        /// Exam data file (defaults to `exams_path` from the config)
        #[arg(long)]
        exams: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List stored attempts, newest first
    History {
        /// Only attempts of this exam
        #[arg(long)]
        exam_id: Option<String>,

        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: u32,

        /// Attempts per page
        #[arg(long, default_value = "10")]
        limit: u32,

        /// Show only the most recent attempt
        #[arg(long)]
        latest: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Delete a stored attempt
    Delete {
        /// Stored attempt id
        #[arg(long)]
        session_id: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate an exam data file
    Validate {
        /// Path to the exam data file
        #[arg(long)]
        exams: PathBuf,
    },

    /// List the exams of a data file
    List {
        /// Path to the exam data file
        #[arg(long)]
        exams: PathBuf,
    },

    /// Create a starter config and sample exam data
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("examrun=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            exam_id,
            exams,
            duration,
            no_save,
            config,
        } => commands::take::execute(exam_id, exams, duration, no_save, config).await,
        Commands::Review {
            session_id,
            exam_id,
            exams,
            config,
        } => commands::review::execute(session_id, exam_id, exams, config).await,
        Commands::History {
            exam_id,
            page,
            limit,
            latest,
            config,
        } => commands::history::execute(exam_id, page, limit, latest, config).await,
        Commands::Delete { session_id, config } => {
            commands::delete::execute(session_id, config).await
        }
        Commands::Validate { exams } => commands::validate::execute(exams),
        Commands::List { exams } => commands::list::execute(exams),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
