use crate::diary_entry::{sort_entries, DiaryEntry, EntryId};
use std::collections::HashMap;
use tracing::debug;

/// A pin flip that has been applied locally but not yet confirmed remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinToggle {
    pub id: EntryId,
    pub previous: bool,
}

impl PinToggle {
    /// The flag being persisted.
    pub fn target(&self) -> bool {
        !self.previous
    }
}

/// Optimistic pin updates, at most one in flight per entry.
#[derive(Debug, Default)]
pub struct PinTracker {
    in_flight: HashMap<EntryId, PinToggle>,
}

impl PinTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase one: flip the flag locally and re-sort. Returns `None` when the
    /// entry is unknown or a toggle for it is still pending.
    pub fn apply(&mut self, entries: &mut [DiaryEntry], id: EntryId) -> Option<PinToggle> {
        if self.in_flight.contains_key(&id) {
            debug!(id, "pin toggle already in flight, ignoring");
            return None;
        }
        let entry = entries.iter_mut().find(|e| e.id == id)?;
        let toggle = PinToggle {
            id,
            previous: entry.is_top,
        };
        entry.is_top = toggle.target();
        sort_entries(entries);
        self.in_flight.insert(id, toggle);
        Some(toggle)
    }

    /// Phase two, success: the local state already matches the backend.
    pub fn confirm(&mut self, toggle: PinToggle) {
        self.in_flight.remove(&toggle.id);
    }

    /// Phase two, failure: restore the previous flag.
    pub fn revert(&mut self, entries: &mut [DiaryEntry], toggle: PinToggle) {
        self.in_flight.remove(&toggle.id);
        if let Some(entry) = entries.iter_mut().find(|e| e.id == toggle.id) {
            entry.is_top = toggle.previous;
            sort_entries(entries);
        }
    }

    /// Re-applies pending flips to a freshly fetched list, which may predate
    /// them. Callers sort afterwards.
    pub fn reapply(&self, entries: &mut [DiaryEntry]) {
        for toggle in self.in_flight.values() {
            if let Some(entry) = entries.iter_mut().find(|e| e.id == toggle.id) {
                entry.is_top = toggle.target();
            }
        }
    }

    pub fn is_pending(&self, id: EntryId) -> bool {
        self.in_flight.contains_key(&id)
    }
}
