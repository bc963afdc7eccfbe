use std::fs::{self, File};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app;
mod config;
mod handler;
mod page;
mod tui;
mod ui;

use api::{ChatClient, ChatRequest};
use app::App;
use config::Config;
use handler::Dispatcher;
use tui::AppEvent;

/// Animation frame interval for smooth scrolling.
const TICK_RATE: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "steuerpilot", version)]
#[command(about = "Terminal chat widget for the SteuerPilot tax-preparation demo")]
struct Cli {
    /// Backend base URL, e.g. http://localhost:8080
    #[arg(long, global = true, env = "STEUERPILOT_URL")]
    base_url: Option<String>,
    /// User id sent with every chat turn
    #[arg(long, global = true, env = "STEUERPILOT_USER_ID")]
    user_id: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat widget (default)
    Chat,
    /// Check whether the backend has an API key configured
    Health,
    /// Send one message and print the reply
    Ask {
        /// The message to send
        message: String,
        /// Continue an existing conversation
        #[arg(short, long)]
        session_id: Option<String>,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective settings to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Chat);
    init_logging(matches!(command, Commands::Chat));

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "using default configuration");
            Config::new()
        }
    }
    .with_overrides(cli.base_url, cli.user_id);

    match command {
        Commands::Chat => run_chat(&config).await,
        Commands::Health => run_health(&config).await,
        Commands::Ask { message, session_id } => run_ask(&config, &message, session_id).await,
        Commands::Config { save } => show_config(&config, save),
    }
}

fn init_logging(interactive: bool) {
    let default_level = if interactive { "info" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    if !interactive {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    }

    // The widget owns the terminal, so logs go to a file instead.
    let Some(log_dir) = dirs::data_local_dir().map(|dir| dir.join("steuerpilot")) else {
        return;
    };
    if fs::create_dir_all(&log_dir).is_err() {
        return;
    }
    let Ok(file) = File::options()
        .create(true)
        .append(true)
        .open(log_dir.join("steuerpilot.log"))
    else {
        return;
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

fn client_for(config: &Config) -> Result<ChatClient> {
    Ok(ChatClient::with_timeout(
        config.base_url(),
        config.request_timeout(),
    )?)
}

async fn run_chat(config: &Config) -> Result<()> {
    let client = client_for(config)?;
    info!(
        base_url = client.base_url(),
        user_id = config.user_id(),
        "starting chat widget"
    );
    let mut app = App::new(config.user_id());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(TICK_RATE);
    let dispatcher = Dispatcher::new(client, events.sender());
    dispatcher.check_health();

    let result = run_loop(&mut terminal, &mut app, &mut events, &dispatcher).await;

    tui::restore()?;
    info!(bubbles = app.transcript().len(), "chat widget closed");
    result
}

async fn run_loop(
    terminal: &mut tui::Tui,
    app: &mut App,
    events: &mut tui::EventHandler,
    dispatcher: &Dispatcher,
) -> Result<()> {
    let mut redraw = true;
    while !app.should_quit {
        if redraw {
            terminal.draw(|frame| ui::render(app, frame))?;
        }

        let Some(event) = events.next().await else {
            break;
        };
        // Idle ticks leave the screen unchanged.
        redraw = !matches!(event, AppEvent::Tick) || app.page.is_animating();
        handler::handle_event(app, event, dispatcher)?;
    }
    Ok(())
}

async fn run_health(config: &Config) -> Result<()> {
    let client = client_for(config)?;
    let result = client.health().await;
    println!("{}", app::health_status(&result));

    if let Err(err) = result {
        bail!("health check against {} failed: {}", client.base_url(), err);
    }
    Ok(())
}

async fn run_ask(config: &Config, message: &str, session_id: Option<String>) -> Result<()> {
    let message = message.trim();
    if message.is_empty() {
        bail!("Message is empty");
    }

    let client = client_for(config)?;
    let request = ChatRequest {
        message: message.to_string(),
        session_id,
        user_id: config.user_id().to_string(),
    };

    let response = match client.chat(&request).await {
        Ok(response) => response,
        Err(err) => {
            println!("{}", app::FAILURE_BUBBLE);
            bail!("{err}");
        }
    };

    println!("{}", app::reply_text(response.reply));
    if let Some(session_id) = response.session_id {
        // Keep stdout to the reply alone so it can be piped.
        eprintln!("session: {session_id}");
    }
    Ok(())
}

fn show_config(config: &Config, save: bool) -> Result<()> {
    println!("base_url: {}", config.base_url());
    println!("user_id:  {}", config.user_id());
    match config.request_timeout() {
        Some(timeout) => println!("timeout:  {}s", timeout.as_secs()),
        None => println!("timeout:  none"),
    }

    if save {
        let resolved = Config {
            base_url: Some(config.base_url().to_string()),
            user_id: Some(config.user_id().to_string()),
            request_timeout_secs: config.request_timeout_secs,
        };
        let path = resolved.save()?;
        println!("saved to {}", path.display());
    } else if let Ok(path) = Config::get_config_path() {
        println!("file:     {}", path.display());
    }
    Ok(())
}
