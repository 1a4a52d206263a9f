//! # Summer CLI (`summer`)
//!
//! Extract a web page's readable content, summarize it through the
//! configured backend, and browse past summaries.
//!
//! ## Usage
//!
//! ```bash
//! summer --config ./config/summer.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `summer init` | Create the SQLite store and run schema migrations |
//! | `summer providers` | Show which credentials the backend already has |
//! | `summer extract <url>` | Print the extracted page text |
//! | `summer summarize <url>` | Extract, validate, and summarize a page |
//! | `summer history list` | Print stored summaries, most recent first |
//! | `summer history clear` | Delete all stored summaries |
//! | `summer models [provider]` | Print recently used custom models |
//!
//! ## Examples
//!
//! ```bash
//! # Summarize with a local model
//! summer summarize https://example.com/post --provider ollama --model llama3.2
//!
//! # Use a model that is not in the preset list
//! summer summarize --file page.html --provider groq --model other --custom-model qwen-qwq-32b
//!
//! # Watsonx with credentials supplied on the command line
//! summer summarize https://example.com --provider watsonx --model ibm/granite-13b-instruct-v2 \
//!     --apikey "$WX_KEY" --watsonx-url https://us-south.ml.cloud.ibm.com --project-id "$WX_PROJECT"
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use summer::config::{self, Config};
use summer::models::Provider;
use summer::progress::ProgressMode;
use summer::providers::ProviderForm;
use summer::{extract, history, migrate, orchestrator, page, providers};

/// Summer: web page summarization through interchangeable LLM providers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/summer.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "summer",
    about = "Summer: extract a web page and summarize it with your choice of LLM provider",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/summer.toml`. Backend, store, limit, and
    /// per-provider default model settings are read from this file.
    #[arg(long, global = true, default_value = "./config/summer.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the history store.
    ///
    /// Creates the SQLite file and its tables. Safe to run repeatedly.
    Init,

    /// Show provider capabilities reported by the backend.
    ///
    /// Lists, per provider, which credentials the backend environment
    /// already supplies and therefore need not be passed on the command line.
    Providers,

    /// Extract and print the main content of a page without summarizing it.
    ///
    /// Works without a config file.
    Extract {
        /// Page URL (http or https).
        #[arg(required_unless_present = "file")]
        url: Option<String>,

        /// Read the page from a local HTML file instead of a URL.
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        /// Print JSON (`source`, `length`, `content`).
        #[arg(long)]
        json: bool,
    },

    /// Summarize a page.
    ///
    /// Extracts the page's main content, validates provider settings against
    /// what the backend already has configured, sends the request, and saves
    /// the result to history.
    Summarize {
        /// Page URL (http or https).
        #[arg(required_unless_present = "file")]
        url: Option<String>,

        /// Read the page from a local HTML file instead of a URL.
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        /// Provider: `openai`, `groq`, `watsonx`, or `ollama`.
        #[arg(long)]
        provider: Provider,

        /// Model name, or `other` to use `--custom-model`.
        ///
        /// Falls back to `[providers.<name>].default_model` from the config.
        #[arg(long)]
        model: Option<String>,

        /// Free-text model used when `--model other`.
        #[arg(long, default_value = "")]
        custom_model: String,

        /// API key. Not needed when the backend already has one.
        #[arg(long, default_value = "")]
        apikey: String,

        /// Watsonx project ID.
        #[arg(long, default_value = "")]
        project_id: String,

        /// Watsonx space ID.
        #[arg(long, default_value = "")]
        space_id: String,

        /// Watsonx endpoint URL.
        #[arg(long, default_value = "")]
        watsonx_url: String,

        /// Extra instructions passed to the model.
        #[arg(long, default_value = "")]
        instructions: String,

        /// Progress output on stderr: `human`, `json`, or `off`.
        ///
        /// Defaults to `human` when stderr is a terminal, otherwise `off`.
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },

    /// Browse or clear stored summaries.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Print recently used custom models.
    Models {
        /// Limit output to one provider.
        provider: Option<Provider>,
    },
}

/// History subcommands.
#[derive(Subcommand)]
enum HistoryAction {
    /// Print stored summaries, most recent first.
    List {
        /// Print the raw records as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete all stored summaries.
    Clear,
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s).ok_or_else(|| format!("invalid progress mode '{}': use human, json, or off", s))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Extraction needs no backend or store; run it with defaults if there is no config.
    if let Commands::Extract { url, file, json } = &cli.command {
        let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
        let source = page::page_for(
            url.as_deref(),
            file.clone(),
            Duration::from_secs(cfg.backend.timeout_secs),
        )?;
        extract::run_extract(source.as_ref(), *json).await?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Store initialized at {}", cfg.store.path.display());
        }
        Commands::Providers => {
            providers::run_providers(&cfg).await?;
        }
        Commands::Extract { .. } => unreachable!("handled above"),
        Commands::Summarize {
            url,
            file,
            provider,
            model,
            custom_model,
            apikey,
            project_id,
            space_id,
            watsonx_url,
            instructions,
            progress,
        } => {
            let source = page::page_for(
                url.as_deref(),
                file,
                Duration::from_secs(cfg.backend.timeout_secs),
            )?;
            let model = model
                .or_else(|| cfg.default_model(provider).map(str::to_string))
                .unwrap_or_default();
            let form = ProviderForm {
                provider,
                model,
                custom_model,
                apikey,
                project_id,
                space_id,
                watsonx_url,
                instructions,
            };
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            orchestrator::run_summarize(&cfg, source.as_ref(), &form, reporter).await?;
        }
        Commands::History { action } => match action {
            HistoryAction::List { json } => {
                history::run_history_list(&cfg, json).await?;
            }
            HistoryAction::Clear => {
                history::run_history_clear(&cfg).await?;
            }
        },
        Commands::Models { provider } => {
            history::run_models(&cfg, provider).await?;
        }
    }

    Ok(())
}
