use color_eyre::eyre::{eyre, Result};
use crossterm::event::{Event, EventStream, KeyEventKind};
use futures::StreamExt;
use memory_lane::{
    config::{self, Config, Settings},
    effects::Dispatcher,
    session::SessionStore,
    supabase::SupabaseClient,
    ui::UI,
    Collaborator, DiaryState,
};
use std::{fs::OpenOptions, path::Path, sync::Arc, sync::Mutex};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let dotenv = config::load_dotenv();
    init_logging(&config::log_path())?;
    if let Some(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let config = Config::load();
    let backend: Arc<dyn Collaborator> = Arc::new(SupabaseClient::new(
        config.backend.clone(),
        SessionStore::new(&config.session_file),
    ));

    let mut ui = UI::new()?;
    let result = run(&mut ui, backend, config.settings).await;
    drop(ui);

    info!("Shutting down");
    result
}

async fn run(ui: &mut UI, backend: Arc<dyn Collaborator>, settings: Settings) -> Result<()> {
    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(Arc::clone(&backend), settings.clone(), tx);
    // Held for the life of the view; dropping it releases the listener.
    let mut sessions = backend.subscribe();
    let mut events = EventStream::new();

    let mut diary_state = DiaryState::new(settings);
    dispatcher.spawn(diary_state.startup());

    while !diary_state.should_quit() {
        ui.display(&diary_state)?;

        tokio::select! {
            Some(outcome) = outcomes.recv() => {
                let follow_up = diary_state.apply(outcome);
                dispatcher.spawn(follow_up);
            }
            Some(event) = sessions.next() => {
                diary_state.apply_session_event(event);
            }
            input = events.next() => match input {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(action) = ui.handle_key(key, &mut diary_state) {
                        let effects = diary_state.handle(action);
                        dispatcher.spawn(effects);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(eyre!("Failed to read terminal input: {}", e)),
                None => break,
            },
        }
    }

    Ok(())
}

fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| eyre!("Failed to open log file {}: {}", path.display(), e))?;

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
