use adgen_core::{AssetRef, Config, GenerationClient, TurnController, TurnSeed};
use anyhow::Result;
use clap::Parser;

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "adgen")]
#[command(about = "Chat with the ad generation backend and watch the campaign take shape")]
struct Cli {
    /// Generation endpoint URL (overrides ADGEN_ENDPOINT and the config file)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Save --endpoint to the config file
    #[arg(long, requires = "endpoint")]
    remember: bool,

    /// Send this message as the first turn on startup
    #[arg(short, long)]
    message: Option<String>,

    /// Image URL or data URL to send with the first message
    #[arg(long, requires = "message")]
    image: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = logging::default_log_path()?;
    logging::init_to_file(&cli.log_level, &log_path)?;

    let config = Config::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "ignoring unreadable config");
        Config::new()
    });
    if cli.remember {
        if let Some(endpoint) = &cli.endpoint {
            Config::save_endpoint(endpoint)?;
        }
    }

    let endpoint = cli.endpoint.clone().unwrap_or_else(|| config.endpoint());
    let client = GenerationClient::with_connect_timeout(&endpoint, config.connect_timeout())?;
    let controller = TurnController::new(client, config.validation_policy());
    tracing::info!(%endpoint, log = %log_path.display(), "starting adgen");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let mut app = App::new(controller, events.sender());
    app.start_seeded(&TurnSeed {
        message: cli.message,
        image: AssetRef::non_empty(cli.image),
    });

    let result = run(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;
        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}
