//! radcoach CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "radcoach",
    version,
    about = "Radiology report feedback and scoring"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// How `analyze` prints its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze learner reports against a case library
    Analyze {
        /// Path to a case library .toml file or directory
        #[arg(long)]
        cases: PathBuf,

        /// Analyze only this case
        #[arg(long)]
        case: Option<String>,

        /// Learner report text (defaults to the case's sample report)
        #[arg(long, requires = "case", conflicts_with = "text_file")]
        text: Option<String>,

        /// Read the learner report from a file
        #[arg(long, requires = "case")]
        text_file: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Max concurrent analyses (overrides the config file)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Directory for JSON and HTML reports
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List the cases in a library
    List {
        /// Path to a case library .toml file or directory
        #[arg(long)]
        cases: PathBuf,
    },

    /// Validate case library TOML files
    Validate {
        /// Path to a case library .toml file or directory
        #[arg(long)]
        cases: PathBuf,
    },

    /// Create a starter config and example case library
    Init,
}

#[tokio::main]
async fn main() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "radcoach=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            cases,
            case,
            text,
            text_file,
            config,
            parallelism,
            format,
            output,
        } => {
            commands::analyze::execute(commands::analyze::AnalyzeArgs {
                cases,
                case,
                text,
                text_file,
                config,
                parallelism,
                format,
                output,
            })
            .await
        }
        Commands::List { cases } => commands::list::execute(cases),
        Commands::Validate { cases } => commands::validate::execute(cases),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
