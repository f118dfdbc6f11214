//! In-memory collaborator for tests.

use crate::{
    collaborator::Collaborator,
    diary_entry::{sort_entries, DiaryEntry, EntryId, NewEntry},
    error::DiaryError,
    session::{Credentials, Session, SessionEvent, SessionHub, SessionSubscription, User},
};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch,
    Insert,
    SetPinned { id: EntryId, pinned: bool },
    CurrentSession,
    SignIn,
    SignOut,
    Upload {
        bucket: String,
        key: String,
        content_type: String,
        len: usize,
    },
}

#[derive(Debug, Default)]
pub struct Failures {
    pub fetch: bool,
    pub insert: bool,
    pub upload: bool,
    pub pin: bool,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<DiaryEntry>,
    next_id: EntryId,
    session: Option<Session>,
    calls: Vec<Call>,
    fail: Failures,
}

pub struct FakeBackend {
    inner: Mutex<Inner>,
    hub: SessionHub,
}

pub const EMAIL: &str = "author@example.com";
pub const PASSWORD: &str = "hunter2";

impl FakeBackend {
    pub fn new() -> Self {
        FakeBackend {
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Inner::default()
            }),
            hub: SessionHub::new(),
        }
    }

    pub fn with_entries(entries: Vec<DiaryEntry>) -> Self {
        let backend = Self::new();
        {
            let mut inner = backend.lock();
            inner.next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
            inner.entries = entries;
        }
        backend
    }

    pub fn signed_in(self) -> Self {
        self.lock().session = Some(author_session());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn fail(&self, set: impl FnOnce(&mut Failures)) {
        set(&mut self.lock().fail);
    }

    pub fn stored(&self) -> Vec<DiaryEntry> {
        self.lock().entries.clone()
    }

    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }
}

pub fn author_session() -> Session {
    Session {
        access_token: "fake-token".to_string(),
        refresh_token: None,
        expires_at: None,
        user: User {
            id: "author".to_string(),
            email: Some(EMAIL.to_string()),
        },
    }
}

#[async_trait]
impl Collaborator for FakeBackend {
    async fn fetch_entries(&self) -> Result<Vec<DiaryEntry>, DiaryError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Fetch);
        if inner.fail.fetch {
            return Err(DiaryError::Connectivity("connection refused".into()));
        }
        let mut entries = inner.entries.clone();
        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn insert_entry(&self, entry: &NewEntry) -> Result<DiaryEntry, DiaryError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Insert);
        if inner.fail.insert {
            return Err(DiaryError::Persist("row violates policy".into()));
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let created = DiaryEntry {
            id,
            title: entry.title.clone(),
            content: entry.content.clone(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::hours(id),
            mood: entry.mood,
            weather: entry.weather,
            location: entry.location.clone(),
            images: entry.images.clone(),
            is_top: false,
        };
        inner.entries.push(created.clone());
        Ok(created)
    }

    async fn set_pinned(&self, id: EntryId, pinned: bool) -> Result<(), DiaryError> {
        let mut inner = self.lock();
        inner.calls.push(Call::SetPinned { id, pinned });
        if inner.fail.pin {
            return Err(DiaryError::Persist("update rejected".into()));
        }
        match inner.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.is_top = pinned;
                Ok(())
            }
            None => Err(DiaryError::Persist(format!("no entry {id}"))),
        }
    }

    async fn current_session(&self) -> Result<Option<Session>, DiaryError> {
        let mut inner = self.lock();
        inner.calls.push(Call::CurrentSession);
        Ok(inner.session.clone())
    }

    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe()
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, DiaryError> {
        let session = {
            let mut inner = self.lock();
            inner.calls.push(Call::SignIn);
            if credentials.email != EMAIL || credentials.password != PASSWORD {
                return Err(DiaryError::Auth("Invalid login credentials".into()));
            }
            let session = author_session();
            inner.session = Some(session.clone());
            session
        };
        self.hub.publish(SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), DiaryError> {
        {
            let mut inner = self.lock();
            inner.calls.push(Call::SignOut);
            inner.session = None;
        }
        self.hub.publish(SessionEvent::SignedOut);
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DiaryError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            len: bytes.len(),
        });
        if inner.fail.upload {
            return Err(DiaryError::Upload("Bucket not found".into()));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("https://fake.local/storage/v1/object/public/{bucket}/{key}")
    }
}
