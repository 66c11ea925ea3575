use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use support_chat_core::config::API_URL_ENV;
use support_chat_core::format::local_bubble_time;
use support_chat_core::{
    ChatApiClient, ChatWidget, Config, FileSessionStore, MemorySessionStore, SessionStore,
};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "support-chat", version)]
#[command(about = "Chat with TechStore customer support from the terminal")]
struct Cli {
    /// Support backend base URL (overrides the config file)
    #[arg(long, global = true, env = API_URL_ENV)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message in the saved conversation and print the reply
    Ask {
        /// Your message
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Print the saved conversation
    History,
    /// Forget the saved conversation
    New,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.command.is_none())?;

    let config = Config::load()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not load config, using defaults");
            Config::new()
        })
        .with_api_url(cli.api_url);
    tracing::info!(api_url = %config.api_url, "starting support chat");

    let mut widget = build_widget(&config)?;

    match cli.command {
        None => run_tui(widget, &config).await,
        Some(Commands::Ask { message }) => ask(&mut widget, &message.join(" ")).await,
        Some(Commands::History) => print_history(&mut widget).await,
        Some(Commands::New) => {
            widget.new_chat();
            println!("Started a new conversation.");
            Ok(())
        }
    }
}

fn build_widget(config: &Config) -> Result<ChatWidget> {
    let client = ChatApiClient::from_config(config)?;

    let store: Box<dyn SessionStore> = match FileSessionStore::default_location() {
        Ok(store) => {
            tracing::debug!(path = %store.path().display(), "using session file");
            Box::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "session will not be remembered between runs");
            Box::new(MemorySessionStore::new())
        }
    };

    Ok(ChatWidget::new(Arc::new(client), store))
}

fn log_file_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("support-chat").join("support-chat.log"))
}

/// The TUI owns the terminal, so it logs to a file; one-shot commands log to stderr
fn init_logging(to_file: bool) -> Result<()> {
    let default_level = if to_file { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("support_chat={default_level}")));

    if to_file {
        let Some(path) = log_file_path() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    Ok(())
}

async fn run_tui(widget: ChatWidget, config: &Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut app = App::new(widget, config.api_url.clone());
    app.start_resume();

    let result = run_loop(&mut terminal, &mut app).await;

    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}

async fn ask(widget: &mut ChatWidget, message: &str) -> Result<()> {
    widget.resume().await;

    if !widget.send(message).await {
        bail!("Message is empty");
    }

    let state = widget.state();
    if let Some(error) = state.error() {
        bail!("{}", error);
    }
    if let Some(reply) = state.messages().last() {
        println!("{}", reply.text);
    }
    Ok(())
}

async fn print_history(widget: &mut ChatWidget) -> Result<()> {
    widget.resume().await;

    let state = widget.state();
    let Some(session_id) = state.session_id() else {
        println!("No saved conversation.");
        return Ok(());
    };

    println!("Conversation {}", session_id);
    for message in state.messages() {
        let who = if message.is_from_user() { "You" } else { "Support" };
        println!(
            "[{}] {}: {}",
            local_bubble_time(&message.created_at),
            who,
            message.text
        );
    }
    Ok(())
}
