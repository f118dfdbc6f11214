use crate::{
    diary_entry::{DiaryEntry, EntryId, NewEntry},
    error::DiaryError,
    session::{Credentials, Session, SessionSubscription},
};
use async_trait::async_trait;

/// The hosted backend: one `entries` table, auth, and object storage.
///
/// Constructed once by the binary and handed to everything that talks to the
/// backend, so tests can swap in an in-memory implementation.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// All entries, pinned first then newest first.
    async fn fetch_entries(&self) -> Result<Vec<DiaryEntry>, DiaryError>;

    async fn insert_entry(&self, entry: &NewEntry) -> Result<DiaryEntry, DiaryError>;

    async fn set_pinned(&self, id: EntryId, pinned: bool) -> Result<(), DiaryError>;

    async fn current_session(&self) -> Result<Option<Session>, DiaryError>;

    /// Session-change notifications until the returned handle is dropped.
    fn subscribe(&self) -> SessionSubscription;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, DiaryError>;

    /// Ends the session remotely and wipes any locally persisted session.
    async fn sign_out(&self) -> Result<(), DiaryError>;

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), DiaryError>;

    fn public_url(&self, bucket: &str, key: &str) -> String;
}
