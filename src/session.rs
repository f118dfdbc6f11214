use crate::error::DiaryError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at <= Utc::now().timestamp())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Session),
    SignedOut,
}

/// Fan-out point for session changes. Every collaborator owns one.
#[derive(Debug, Clone)]
pub struct SessionHub {
    sender: broadcast::Sender<SessionEvent>,
    listeners: Arc<AtomicUsize>,
}

impl SessionHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        SessionHub {
            sender,
            listeners: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> SessionSubscription {
        self.listeners.fetch_add(1, Ordering::SeqCst);
        SessionSubscription {
            receiver: self.sender.subscribe(),
            listeners: Arc::clone(&self.listeners),
        }
    }

    pub fn publish(&self, event: SessionEvent) {
        // No receivers is fine, nobody is watching yet.
        let _ = self.sender.send(event);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A live session-change listener. Dropping it releases the listener.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: broadcast::Receiver<SessionEvent>,
    listeners: Arc<AtomicUsize>,
}

impl SessionSubscription {
    /// Waits for the next change. `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session listener lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_next(&mut self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.listeners.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Session persisted between runs as a small JSON file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing and unreadable files read as signed out, as do expired
    /// sessions that cannot be refreshed.
    pub fn load(&self) -> Option<Session> {
        let serialized = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read session file: {e}");
                return None;
            }
        };
        match serde_json::from_str::<Session>(&serialized) {
            Ok(session) if session.is_expired() && session.refresh_token.is_none() => {
                debug!("discarding expired session");
                if let Err(e) = self.clear() {
                    warn!("Expired session left on disk: {e}");
                }
                None
            }
            Ok(session) => Some(session),
            Err(e) => {
                warn!("ignoring malformed session file: {e}");
                None
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), DiaryError> {
        let serialized = serde_json::to_string(session)?;
        std::fs::write(&self.path, serialized)
            .map_err(|e| DiaryError::Config(format!("cannot write session file: {e}")))
    }

    pub fn clear(&self) -> Result<(), DiaryError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DiaryError::Config(format!(
                "cannot remove session file: {e}"
            ))),
        }
    }
}
