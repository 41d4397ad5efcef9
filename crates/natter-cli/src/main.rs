mod output;
mod repl;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "natter", version, about = "Streaming chat client for the terminal")]
struct Cli {
    /// Non-interactive mode: send one message and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Working directory
    #[arg(short = 'c', long = "cwd")]
    working_dir: Option<PathBuf>,

    /// Model to use (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Chat endpoint (overrides config)
    #[arg(long)]
    endpoint: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = natter_core::config::load_config(cli.working_dir.clone())
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let filter = if cli.debug || config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }

    if !config.has_api_key() {
        anyhow::bail!(
            "No API key found. Set NATTER_API_KEY or OPENAI_API_KEY, or add one to the config file."
        );
    }

    let storage = natter_storage::FileStore::open(config.data_path())
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let notifier: Arc<dyn natter_core::notify::Notifier> = Arc::new(output::ToastNotifier);
    let mut store = natter_store::SessionStore::new(Arc::new(storage), notifier.clone());
    let mut client = natter_client::ChatClient::new(config.clone(), notifier);

    if let Some(prompt) = cli.prompt {
        repl::send_once(&mut client, &mut store, prompt).await
    } else {
        repl::run(&mut client, &mut store, &config).await
    }
}
