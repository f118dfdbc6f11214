use crate::{
    collaborator::Collaborator,
    config::Settings,
    diary_entry::DiaryEntry,
    diary_state::DiaryState,
    draft::{self, Draft},
    error::DiaryError,
    pin::PinToggle,
    session::{Credentials, Session},
};
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Remote work requested by the view-state.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CheckSession,
    FetchEntries,
    SignIn(Credentials),
    SignOut,
    Submit(Draft),
    PersistPin(PinToggle),
}

/// Result of an [`Effect`], fed back into [`DiaryState::apply`].
#[derive(Debug)]
pub enum Outcome {
    Session(Result<Option<Session>, DiaryError>),
    Entries(Result<Vec<DiaryEntry>, DiaryError>),
    SignedIn(Result<Session, DiaryError>),
    SignedOut(Result<(), DiaryError>),
    Submitted(Result<DiaryEntry, DiaryError>),
    PinPersisted {
        toggle: PinToggle,
        result: Result<(), DiaryError>,
    },
}

impl Effect {
    pub async fn run(self, backend: &dyn Collaborator, settings: &Settings) -> Outcome {
        debug!(effect = ?self, "running effect");
        match self {
            Effect::CheckSession => Outcome::Session(backend.current_session().await),
            Effect::FetchEntries => Outcome::Entries(backend.fetch_entries().await),
            Effect::SignIn(credentials) => Outcome::SignedIn(backend.sign_in(&credentials).await),
            Effect::SignOut => Outcome::SignedOut(backend.sign_out().await),
            Effect::Submit(draft) => {
                Outcome::Submitted(draft::submit(backend, &settings.bucket, &draft).await)
            }
            Effect::PersistPin(toggle) => Outcome::PinPersisted {
                toggle,
                result: backend.set_pinned(toggle.id, toggle.target()).await,
            },
        }
    }
}

/// Runs effects off the render loop. Outcomes arrive on the channel the loop
/// listens to; once the loop is gone they are dropped.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn Collaborator>,
    settings: Arc<Settings>,
    outcomes: UnboundedSender<Outcome>,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn Collaborator>,
        settings: Settings,
        outcomes: UnboundedSender<Outcome>,
    ) -> Self {
        Dispatcher {
            backend,
            settings: Arc::new(settings),
            outcomes,
        }
    }

    pub fn spawn(&self, effects: Vec<Effect>) {
        for effect in effects {
            let backend = Arc::clone(&self.backend);
            let settings = Arc::clone(&self.settings);
            let outcomes = self.outcomes.clone();
            tokio::spawn(async move {
                let outcome = effect.run(backend.as_ref(), &settings).await;
                if outcomes.send(outcome).is_err() {
                    warn!("view closed before an outcome arrived, dropping it");
                }
            });
        }
    }
}

/// Runs `effects` and every follow-up they cause, one at a time, until the
/// state asks for nothing more.
pub async fn settle(state: &mut DiaryState, backend: &dyn Collaborator, effects: Vec<Effect>) {
    let settings = state.settings().clone();
    let mut queue: VecDeque<Effect> = effects.into();
    while let Some(effect) = queue.pop_front() {
        let outcome = effect.run(backend, &settings).await;
        queue.extend(state.apply(outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diary_entry::tests::entry,
        fake_backend::{Call, FakeBackend},
    };
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn persist_pin_sends_the_target_flag() {
        let backend = FakeBackend::with_entries(vec![entry(1, "a", 0, false)]);
        let toggle = PinToggle { id: 1, previous: false };
        let outcome = Effect::PersistPin(toggle)
            .run(&backend, &Settings::default())
            .await;
        assert!(matches!(outcome, Outcome::PinPersisted { result: Ok(()), .. }));
        assert_eq!(backend.calls(), vec![Call::SetPinned { id: 1, pinned: true }]);
    }

    #[tokio::test]
    async fn dispatcher_delivers_outcomes_to_the_loop() {
        let backend: Arc<dyn Collaborator> =
            Arc::new(FakeBackend::with_entries(vec![entry(1, "a", 0, false)]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(backend, Settings::default(), tx);

        dispatcher.spawn(vec![Effect::FetchEntries]);
        match rx.recv().await {
            Some(Outcome::Entries(Ok(entries))) => assert_eq!(entries.len(), 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn outcomes_after_the_loop_ends_are_dropped() {
        let backend = Arc::new(FakeBackend::new());
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let dispatcher = Dispatcher::new(backend.clone(), Settings::default(), tx);
        dispatcher.spawn(vec![Effect::FetchEntries]);
        // Give the task a chance to run; it must not panic.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(backend.calls(), vec![Call::Fetch]);
    }
}
