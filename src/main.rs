use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reportforge::cli::GlobalOptions;
use reportforge::cli::commands::{analyze_style, config, generate, plan, prompt, section};
use reportforge::service::RegenerateSectionRequest;

#[derive(Parser)]
#[command(name = "reportforge")]
#[command(version, about = "LLM-backed activity report generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Config file replacing the global/project chain")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Report store file (overrides store.path)")]
    store: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a report from its section notes
    Generate {
        #[arg(help = "Report ID")]
        report_id: String,
        #[arg(long, help = "JSON file with section notes, replacing the stored ones")]
        notes: Option<PathBuf>,
        #[arg(long, help = "Extra instructions for this generation")]
        instructions: Option<String>,
        #[arg(long, help = "User recorded in the usage log")]
        user: Option<String>,
        #[arg(long, short, help = "Write the report to a file instead of stdout")]
        output: Option<PathBuf>,
        #[arg(long, help = "Print the full result with metadata as JSON")]
        json: bool,
    },

    /// Show token estimate and chunk layout without calling the model
    Plan {
        #[arg(help = "Report ID")]
        report_id: String,
        #[arg(long, help = "JSON file with section notes")]
        notes: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },

    /// Print the prompts a generation would send
    Prompt {
        #[arg(help = "Report ID")]
        report_id: String,
        #[arg(long, help = "JSON file with section notes")]
        notes: Option<PathBuf>,
        #[arg(long, help = "Chunk number (1-based) for chunked reports")]
        chunk: Option<usize>,
    },

    /// Analyze the writing style of a reference document
    AnalyzeStyle {
        #[command(flatten)]
        source: StyleSourceArgs,
        #[arg(long, help = "User recorded in the usage log")]
        user: Option<String>,
    },

    /// Rewrite one section of a generated report
    RegenerateSection {
        #[arg(help = "Report ID")]
        report_id: String,
        #[arg(help = "Section ID")]
        section_id: String,
        #[arg(long, help = "What to change (max 1000 characters)")]
        feedback: Option<String>,
        #[arg(long, help = "User recorded in the usage log")]
        user: Option<String>,
        #[arg(long, short, help = "Write the section to a file instead of stdout")]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct StyleSourceArgs {
    #[arg(long, help = "Stored reference document ID; the result is saved on it")]
    document: Option<String>,
    #[arg(long, help = "Plain text file; the result is only printed")]
    file: Option<PathBuf>,
}

impl StyleSourceArgs {
    fn into_source(self) -> anyhow::Result<analyze_style::StyleSource> {
        match (self.document, self.file) {
            (Some(id), _) => Ok(analyze_style::StyleSource::Document(id)),
            (None, Some(path)) => Ok(analyze_style::StyleSource::File(path)),
            (None, None) => anyhow::bail!("pass --document or --file"),
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mreportforge encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Default hook prints the backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let global = GlobalOptions {
        config: cli.config,
        store: cli.store,
        quiet: cli.quiet,
    };

    // Config commands never touch the network or the store
    if let Commands::Config { action } = cli.command {
        match action {
            ConfigAction::Show { global: only_global, format } => {
                config::show(&global, only_global, &format)?
            }
            ConfigAction::Path => config::path()?,
            ConfigAction::Init { global, force } => config::init(global, force)?,
        }
        return Ok(());
    }

    let rt = Runtime::new()?;
    rt.block_on(async {
        match cli.command {
            Commands::Generate {
                report_id,
                notes,
                instructions,
                user,
                output,
                json,
            } => {
                generate::run(
                    &global,
                    generate::GenerateOptions {
                        report_id,
                        user_id: user,
                        notes,
                        instructions,
                        output,
                        json,
                    },
                )
                .await?
            }
            Commands::Plan {
                report_id,
                notes,
                json,
            } => plan::run(&global, report_id, notes, json).await?,
            Commands::Prompt {
                report_id,
                notes,
                chunk,
            } => prompt::run(&global, report_id, notes, chunk).await?,
            Commands::AnalyzeStyle { source, user } => {
                analyze_style::run(&global, source.into_source()?, user).await?
            }
            Commands::RegenerateSection {
                report_id,
                section_id,
                feedback,
                user,
                output,
            } => {
                section::run(
                    &global,
                    RegenerateSectionRequest {
                        report_id,
                        section_id,
                        user_id: user,
                        feedback,
                    },
                    output,
                )
                .await?
            }
            Commands::Config { .. } => {}
        }
        anyhow::Ok(())
    })
}
