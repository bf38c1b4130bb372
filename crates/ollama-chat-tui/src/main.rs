use std::fs::File;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ollama_chat_core::{Config, ConnectivityStatus, EndpointConfig, OllamaClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "ollama-chat", version)]
#[command(about = "Chat with a local Ollama server from the terminal")]
struct Cli {
    /// Ollama server URL
    #[arg(long, global = true)]
    url: Option<String>,
    /// Model to use
    #[arg(short, long, global = true)]
    model: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single prompt and print the reply
    Ask {
        /// Your prompt
        prompt: String,
    },
    /// List models installed on the server
    Models,
    /// Check whether the server is reachable
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|err| {
        eprintln!("Ignoring unreadable config: {err}");
        Config::new()
    });
    let mut endpoint = config.endpoint();
    if let Some(url) = cli.url {
        endpoint.base_url = url;
    }
    if let Some(model) = cli.model {
        endpoint.model = model;
    }

    match cli.command {
        None => {
            init_file_logging()?;
            run_tui(endpoint).await
        }
        Some(command) => {
            init_stderr_logging();
            run_command(command, endpoint).await
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ollama_chat_core=info,ollama_chat_tui=info".into())
}

/// The TUI owns stderr, so logs go to a file next to the config.
fn init_file_logging() -> Result<()> {
    let log_path = Config::get_config_path()?.with_file_name("ollama-chat.log");
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&log_path)
        .with_context(|| format!("creating log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_tui(endpoint: EndpointConfig) -> Result<()> {
    tracing::info!(url = %endpoint.base_url, model = %endpoint.model, "starting chat");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(endpoint);

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    app.session.teardown();
    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(app, event).await?,
                None => break,
            },
            Some(listing) = app.model_listings.recv() => app.finish_model_listing(listing),
            // Store or connectivity updated in the background
            _ = app.session.changed() => {}
        }
    }
    Ok(())
}

async fn run_command(command: Commands, endpoint: EndpointConfig) -> Result<()> {
    let model = endpoint.model.clone();
    let client = OllamaClient::new(endpoint);

    match command {
        Commands::Ask { prompt } => {
            let reply = client.generate(&prompt, Some(&model)).await?;
            println!("{}", reply);
        }
        Commands::Models => {
            let models = client.list_models().await?;
            if models.is_empty() {
                println!("No models found. Pull a model with: ollama pull {}", model);
            }
            for name in models {
                let marker = if name == model { "*" } else { " " };
                println!("{} {}", marker, name);
            }
        }
        Commands::Status => {
            let status = client.probe().await;
            println!("{} ({})", status.label(), client.get_url());
            if status != ConnectivityStatus::Connected {
                client.shutdown();
                std::process::exit(1);
            }
        }
    }

    client.shutdown();
    Ok(())
}
