//! Summadoc CLI - document summarisation server and client
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use summadoc::client::ApiClient;
use summadoc::{agent, api, export, ui, Config, DocumentId, DocumentStore, Lifecycle};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "summadoc=info,tower_http=info";

#[derive(Parser)]
#[command(name = "summadoc")]
#[command(author, version, about = "Document summarisation with txt and docx export", long_about = None)]
struct Cli {
    /// Server URL used by the client commands
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    server: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Path to summadoc.toml (defaults to ./summadoc.toml, then ~/.config/summadoc/)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Upload a document and print its summary
    Upload {
        /// File to summarise (pdf, docx or txt)
        path: PathBuf,
        /// Document title
        #[arg(long, short)]
        title: String,
    },
    /// List summarised documents
    List,
    /// Show one document
    Show {
        id: DocumentId,
    },
    /// Download a summary as txt or docx
    Download {
        id: DocumentId,
        /// Export format: txt or docx
        format: String,
        /// Output path (defaults to <title>_summary.<format>)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Interactive upload, summary and history browser
    Browse,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { config }) => serve(config).await?,
        Some(Commands::Upload { path, title }) => {
            let client = ApiClient::new(&cli.server)?;
            println!("Summarising {}...", path.display());
            let document = client.upload(&path, &title).await?;
            ui::print_document(&document);
        }
        Some(Commands::List) => {
            let client = ApiClient::new(&cli.server)?;
            let entries = client.list().await?;
            if entries.is_empty() {
                println!("No summaries available yet.");
            } else {
                println!("Stored summaries ({}):\n", entries.len());
                for entry in entries {
                    println!(
                        "📄 {} ({})",
                        entry.title.bold(),
                        entry.summary_date.format("%Y-%m-%d %H:%M")
                    );
                    println!("   id: {}\n", entry.id);
                }
            }
        }
        Some(Commands::Show { id }) => {
            let client = ApiClient::new(&cli.server)?;
            let document = client.get(id).await?;
            ui::print_document(&document);
        }
        Some(Commands::Download { id, format, output }) => {
            let client = ApiClient::new(&cli.server)?;
            let export_format: export::ExportFormat = format.parse()?;
            let bytes = client.download(id, &format).await?;
            let path = match output {
                Some(path) => path,
                None => {
                    let document = client.get(id).await?;
                    PathBuf::from(export::file_name(&document.title, export_format))
                }
            };
            std::fs::write(&path, &bytes)?;
            println!("Saved {} ({} bytes)", path.display(), bytes.len());
        }
        Some(Commands::Browse) | None => {
            let client = ApiClient::new(&cli.server)?;
            ui::run(&client).await?;
        }
    }

    Ok(())
}

async fn serve(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        provider = %config.agent.provider,
        model = %config.agent.model,
        "Summadoc starting"
    );

    let store = DocumentStore::open(&config.storage.path)?;
    let summarizer = agent::from_config(&config)?;
    let lifecycle = Lifecycle::from_config(&config, store, summarizer);
    lifecycle.recover_interrupted()?;

    let app = api::api_router(lifecycle, &config.server);
    api::router::serve(app, config.server.bind).await?;
    Ok(())
}
