//! Teachbot - a chatbot you teach as you go
//!
//! Answers from a per-language knowledge store, falls back to the closest
//! known phrase, and asks to be taught whenever it has nothing to say.
//! Runs as an interactive console or as an HTTP API.

use std::borrow::Cow;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod routes;

use crate::config::Config;
use crate::core::ChatEngine;
use routes::ChatService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<Mutex<ChatService>>,
}

#[derive(Debug, Parser)]
#[command(name = "teachbot", version, about = "A chatbot you teach as you go")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding one sub-directory per language mode
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Language mode to start in
    #[arg(long, global = true)]
    mode: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Talk to the bot in the terminal (default)
    Chat,
    /// Serve the HTTP API
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Chat);

    let default_filter = match command {
        Command::Chat => "teachbot=warn",
        Command::Serve => "teachbot=info,tower_http=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut config = Config::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(mode) = cli.mode {
        config.default_mode = mode.trim().to_lowercase();
        config.validate()?;
    }

    tracing::info!(
        "Data in {} (modes: {})",
        config.data_dir.display(),
        config.modes.join(", ")
    );

    let engine = ChatEngine::new(config)?;

    match command {
        Command::Chat => run_chat(engine),
        Command::Serve => serve(engine).await,
    }
}

fn run_chat(engine: ChatEngine) -> anyhow::Result<()> {
    let stdin = io::stdin();
    chat_loop(engine, stdin.lock(), io::stdout())
}

/// Console conversation over any line source. Ends on `exit` or end of input.
fn chat_loop<R: BufRead, W: Write>(
    mut engine: ChatEngine,
    mut input: R,
    mut output: W,
) -> anyhow::Result<()> {
    let mut session = engine.start_session();

    writeln!(output, "{}", engine.messages(&session.mode).greeting)?;

    loop {
        if session.awaiting_teaching() {
            write!(output, "{}", engine.messages(&session.mode).teach_prompt)?;
        } else {
            write!(output, "You: ")?;
        }
        output.flush()?;

        let Some(line) = read_input(&mut input)? else {
            break;
        };

        match engine.respond(&mut session, &line) {
            Ok(reply) => {
                if let Some(text) = reply.text(engine.messages(&session.mode)) {
                    writeln!(output, "AI: {}", text)?;
                }
            }
            Err(e) => {
                tracing::warn!("Could not handle input: {}", e);
                writeln!(output, "AI: {}", engine.messages(&session.mode).teach_failed)?;
            }
        }

        if session.is_finished() {
            break;
        }
    }

    Ok(())
}

/// Next input line, `None` at end of input. Invalid UTF-8 is replaced, not rejected.
fn read_input<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    if input.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    let line = match String::from_utf8_lossy(&buf) {
        Cow::Borrowed(line) => line.to_string(),
        Cow::Owned(line) => {
            tracing::warn!("Input was not valid UTF-8; invalid bytes replaced");
            line
        }
    };
    Ok(Some(line))
}

async fn serve(engine: ChatEngine) -> anyhow::Result<()> {
    let config = engine.config();
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let state = AppState {
        chat: Arc::new(Mutex::new(ChatService::new(engine))),
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("Teachbot API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
