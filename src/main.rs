// ABOUTME: Main entry point for the labterm TUI application

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use directories::ProjectDirs;
use labterm::api::{HttpLabApi, HttpLabApiConfig};
use labterm::app::App;
use labterm::components::LayoutComponent;
use labterm::config::AppConfig;
use ratatui::{prelude::*, Terminal};
use std::{io, path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "labterm", version, about = "Terminal client for remote lab sessions")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lab API base URL, e.g. http://localhost:8080/api/v1
    #[arg(long, env = "LABTERM_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Lab session to attach to
    #[arg(long, env = "LABTERM_SESSION_ID")]
    session: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging()?;
    setup_panic_handler();

    let config = load_config(&cli)?;
    let api_config = HttpLabApiConfig {
        timeout: config.request_timeout(),
        retries: config.request_retries,
        ..HttpLabApiConfig::new(config.api_base()?)
    };
    let api = HttpLabApi::new(api_config).context("Failed to build lab API client")?;

    let mut app = App::new(config, Arc::new(api))?;
    let mut layout = LayoutComponent::new();

    let result = run_tui(&mut app, &mut layout).await;
    app.shutdown().await;
    result
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let path = cli.config.clone().or_else(AppConfig::default_path);
    let mut config = match path {
        Some(path) => AppConfig::load(&path)?,
        None => AppConfig::default(),
    };
    config.apply_env();
    if let Some(url) = &cli.api_base_url {
        config.api_base_url = url.clone();
    }
    if let Some(session) = &cli.session {
        config.session_id = Some(session.clone());
    }
    Ok(config)
}

async fn run_tui(app: &mut App, layout: &mut LayoutComponent) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let poll_rate = Duration::from_millis(50);
    let result = loop {
        app.tick();
        if app.needs_ui_refresh() {
            if let Err(e) = terminal.draw(|frame| layout.render(frame, app)) {
                break Err(e.into());
            }
        }

        match event::poll(poll_rate) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Ok(Event::Resize(_, _)) => app.state.ui_needs_refresh = true,
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }

        if app.state.should_quit {
            info!("Quit requested");
            break Ok(());
        }

        // Yield so spawned API and socket tasks make progress between polls
        tokio::task::yield_now().await;
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!("UI loop ended with error: {}", e);
    }
    result
}

fn setup_logging() -> Result<()> {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let log_dir = ProjectDirs::from("", "", "labterm")
        .map(|dirs| dirs.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from(".labterm/logs"));
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log dir {}", log_dir.display()))?;

    let log_file = log_dir.join(format!(
        "labterm-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labterm=info".into()),
        )
        .init();
    Ok(())
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        // Restore the terminal before reporting
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stderr(), LeaveAlternateScreen);

        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs for more details.");
    }));
}
