//! Image Analyzer command-line entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use image_analyzer::{user_message, BackendKind};
use image_analyzer_cli::check::{render_check, run_check};
use image_analyzer_cli::config::{Overrides, Settings};
use image_analyzer_cli::output::{render_candidates, render_json, render_text};
use image_analyzer_cli::pipeline::analyze_file;

#[derive(Parser)]
#[command(
    name = "image-analyzer",
    about = "Image Analyzer: caption images and list what they show",
    version,
    after_help = "Run 'image-analyzer' with no command to enter interactive mode."
)]
struct Cli {
    /// Inference backend to use.
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendArg>,

    /// Hugging Face API token (overrides HUGGINGFACE_TOKEN).
    #[arg(long, global = true)]
    token: Option<String>,

    /// Local model server URL (overrides IMAGE_ANALYZER_SERVER_URL / OLLAMA_HOST).
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Primary model to try first.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Fallback model, tried in the given order. Repeatable.
    #[arg(long = "fallback", global = true)]
    fallbacks: Vec<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Output results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    /// Hugging Face Inference API.
    Hosted,
    /// Local Ollama-compatible server.
    Local,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Hosted => BackendKind::Hosted,
            BackendArg::Local => BackendKind::Local,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Caption an image and list detected objects.
    Analyze {
        /// Path to the image file.
        path: String,
    },

    /// Check the API token and the local model server.
    Check,

    /// List candidate models for the selected backend.
    Models,

    /// Start the HTTP server.
    #[cfg(feature = "http")]
    ServeHttp {
        /// Listen address (host:port).
        #[arg(long, default_value = "127.0.0.1:7860")]
        addr: String,

        /// Bearer token required from clients.
        /// Also reads from IMAGE_ANALYZER_AUTH_TOKEN env var.
        #[arg(long)]
        auth_token: Option<String>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   image-analyzer completions bash > ~/.local/share/bash-completion/completions/image-analyzer
    ///   image-analyzer completions zsh > ~/.zfunc/_image-analyzer
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive REPL mode.
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    image_analyzer_cli::logging::init(&cli.log_level, cli.log_file.as_deref())?;

    let overrides = Overrides {
        backend: cli.backend.map(BackendKind::from),
        token: cli.token.clone(),
        server_url: cli.server_url.clone(),
        model: cli.model.clone(),
        fallbacks: cli.fallbacks.clone(),
    };
    let settings = match Settings::from_env(&overrides) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", user_message(&e));
            std::process::exit(2);
        }
    };

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Analyze { path } => {
            let outcome = analyze_file(&settings, &path).await;
            if cli.json {
                println!("{}", render_json(&outcome, settings.backend)?);
            } else {
                println!("{}", render_text(&outcome));
            }
            if outcome.is_err() {
                std::process::exit(1);
            }
        }

        Commands::Check => {
            let report = run_check(&settings).await;
            println!("{}", render_check(&report));
            if !report.ready() {
                std::process::exit(1);
            }
        }

        Commands::Models => {
            let candidates = settings.candidates();
            if cli.json {
                let info = serde_json::json!({
                    "backend": settings.backend,
                    "primary": candidates.primary(),
                    "fallbacks": candidates.fallbacks(),
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print!("{}", render_candidates(settings.backend, &candidates));
            }
        }

        #[cfg(feature = "http")]
        Commands::ServeHttp { addr, auth_token } => {
            use std::sync::Arc;

            use image_analyzer_cli::server::{serve, ServerState};

            // Resolve token: CLI flag > env var
            let token = auth_token.or_else(|| std::env::var("IMAGE_ANALYZER_AUTH_TOKEN").ok());
            let analyzer = image_analyzer_cli::pipeline::build_analyzer(&settings)?;

            tracing::info!("Image Analyzer HTTP server ({} backend)", settings.backend);
            if token.is_some() {
                tracing::info!("Auth: bearer token required");
            }

            serve(&addr, Arc::new(ServerState { analyzer, token })).await?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "image-analyzer", &mut std::io::stdout());
        }

        Commands::Repl => {
            let runtime = tokio::runtime::Handle::current();
            let json = cli.json;
            tokio::task::block_in_place(move || {
                image_analyzer_cli::repl::run(settings, json, runtime)
            })?;
        }
    }

    Ok(())
}
