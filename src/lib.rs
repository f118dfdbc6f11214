pub mod collaborator;
pub mod config;
pub mod diary_entry;
pub mod diary_state;
pub mod display;
pub mod draft;
pub mod effects;
pub mod error;
pub mod pin;
pub mod session;
pub mod supabase;
pub mod ui;

#[cfg(test)]
pub(crate) mod fake_backend;

pub use collaborator::Collaborator;
pub use config::{Config, Settings};
pub use diary_entry::{DiaryEntry, Mood, NewEntry, Weather};
pub use diary_state::{Action, DiaryState, View};
pub use error::DiaryError;
