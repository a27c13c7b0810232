//! CAM terminal client entry point.

use cam_client::api_client::{EntityApi, RestClient};
use cam_client::config::{ClientConfig, ConfigError};
use cam_client::error::ClientError;
use cam_client::events::ClientEvent;
use cam_client::keys::map_key;
use cam_client::state::App;
use cam_client::views::render_view;
use crossterm::{
    event::{self, Event as CrosstermEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = ClientConfig::load()?;
    let entity = config.entity().ok_or_else(|| ConfigError::InvalidValue {
        field: "start_entity",
        reason: format!("unknown entity '{}'", config.start_entity),
    })?;
    let api: Arc<dyn EntityApi> = Arc::new(RestClient::new(&config)?);
    let permissions = api.access().await?;

    let mut app = App::new(api, permissions, entity, config.page_size);

    let mut terminal = setup_terminal()?;
    let _guard = TerminalGuard;

    let (event_tx, mut event_rx) = mpsc::channel::<ClientEvent>(256);
    spawn_input_reader(event_tx.clone());

    app.list.refresh().await;

    let mut ticker = tokio::time::interval(Duration::from_millis(250));

    loop {
        terminal.draw(|f| render_view(f, &app))?;

        tokio::select! {
            _ = ticker.tick() => {
                let _ = event_tx.send(ClientEvent::Tick).await;
            }
            Some(event) = event_rx.recv() => {
                if handle_event(&mut app, event).await {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, ClientError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
}

fn spawn_input_reader(sender: mpsc::Sender<ClientEvent>) {
    std::thread::spawn(move || loop {
        if let Ok(true) = event::poll(Duration::from_millis(200)) {
            if let Ok(evt) = event::read() {
                match evt {
                    CrosstermEvent::Key(key) => {
                        let _ = sender.blocking_send(ClientEvent::Input(key));
                    }
                    CrosstermEvent::Resize(width, height) => {
                        let _ = sender.blocking_send(ClientEvent::Resize { width, height });
                    }
                    _ => {}
                }
            }
        }
    });
}

async fn handle_event(app: &mut App, event: ClientEvent) -> bool {
    match event {
        ClientEvent::Input(key) => app.handle_key(key, map_key(key)).await,
        ClientEvent::Resize { .. } | ClientEvent::Tick => false,
    }
}
