use crate::{
    config::Settings,
    diary_entry::{sort_entries, DiaryEntry, EntryId},
    display::{display_date, DisplayDate},
    draft::Draft,
    effects::{Effect, Outcome},
    error::{DiaryError, Surface},
    pin::PinTracker,
    session::{Credentials, Session, SessionEvent},
};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Timeline,
    Detail(EntryId),
    SignIn,
    Compose,
}

/// What the reader asked for. Text fields are edited in place through
/// [`DiaryState::draft_mut`] and [`DiaryState::sign_in_form_mut`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetQuery(String),
    Open(EntryId),
    Back,
    TogglePin(EntryId),
    ToggleDarkMode,
    ShowSignIn,
    SignIn,
    SignOut,
    Compose,
    Submit,
    Refresh,
    DismissAlert,
    Quit,
}

/// Navigation controls that should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nav {
    pub new_entry: bool,
    pub sign_out: bool,
    pub sign_in: bool,
    pub pin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
    pub error: Option<String>,
    pub pending: bool,
}

/// All view-state of the diary. Remote work leaves as [`Effect`]s and comes
/// back as [`Outcome`]s.
#[derive(Debug)]
pub struct DiaryState {
    settings: Settings,
    entries: Vec<DiaryEntry>,
    query: String,
    view: View,
    dark_mode: bool,
    session: Option<Session>,
    banner: Option<String>,
    alert: Option<String>,
    sign_in: SignInForm,
    draft: Draft,
    submitting: bool,
    loading: bool,
    pins: PinTracker,
    quit: bool,
    /// Bumped each time the state is rebuilt from scratch.
    reloads: u64,
}

impl DiaryState {
    pub fn new(settings: Settings) -> Self {
        DiaryState {
            settings,
            entries: Vec::new(),
            query: String::new(),
            view: View::Timeline,
            dark_mode: false,
            session: None,
            banner: None,
            alert: None,
            sign_in: SignInForm::default(),
            draft: Draft::default(),
            submitting: false,
            loading: false,
            pins: PinTracker::new(),
            quit: false,
            reloads: 0,
        }
    }

    /// Effects for a fresh view: session check and initial fetch.
    pub fn startup(&mut self) -> Vec<Effect> {
        self.loading = true;
        vec![Effect::CheckSession, Effect::FetchEntries]
    }

    pub fn handle(&mut self, action: Action) -> Vec<Effect> {
        match action {
            Action::SetQuery(query) => {
                self.query = query;
                vec![]
            }
            Action::Open(id) => {
                if self.entry(id).is_some() {
                    self.view = View::Detail(id);
                }
                vec![]
            }
            Action::Back => {
                self.view = View::Timeline;
                vec![]
            }
            Action::TogglePin(id) => {
                if !self.is_signed_in() {
                    return vec![];
                }
                match self.pins.apply(&mut self.entries, id) {
                    Some(toggle) => {
                        info!(id, pinned = toggle.target(), "Toggling pin");
                        vec![Effect::PersistPin(toggle)]
                    }
                    None => vec![],
                }
            }
            Action::ToggleDarkMode => {
                self.dark_mode = !self.dark_mode;
                vec![]
            }
            Action::ShowSignIn => {
                if !self.is_signed_in() {
                    self.view = View::SignIn;
                }
                vec![]
            }
            Action::SignIn => {
                if self.sign_in.pending || self.is_signed_in() {
                    return vec![];
                }
                self.sign_in.pending = true;
                self.sign_in.error = None;
                vec![Effect::SignIn(Credentials {
                    email: self.sign_in.email.trim().to_string(),
                    password: self.sign_in.password.clone(),
                })]
            }
            Action::SignOut => {
                if self.is_signed_in() {
                    vec![Effect::SignOut]
                } else {
                    vec![]
                }
            }
            Action::Compose => {
                if self.is_signed_in() {
                    self.view = View::Compose;
                }
                vec![]
            }
            Action::Submit => self.submit(),
            Action::Refresh => {
                self.loading = true;
                vec![Effect::FetchEntries]
            }
            Action::DismissAlert => {
                self.alert = None;
                vec![]
            }
            Action::Quit => {
                self.quit = true;
                vec![]
            }
        }
    }

    fn submit(&mut self) -> Vec<Effect> {
        if !self.is_signed_in() || self.submitting {
            return vec![];
        }
        if let Err(e) = self.draft.validate() {
            self.report(DiaryError::from(e));
            return vec![];
        }
        self.submitting = true;
        self.alert = None;
        vec![Effect::Submit(self.draft.clone())]
    }

    pub fn apply(&mut self, outcome: Outcome) -> Vec<Effect> {
        match outcome {
            Outcome::Session(Ok(session)) => {
                self.session = session;
                vec![]
            }
            Outcome::Entries(Ok(mut entries)) => {
                self.pins.reapply(&mut entries);
                sort_entries(&mut entries);
                self.entries = entries;
                self.loading = false;
                if let View::Detail(id) = self.view {
                    if self.entry(id).is_none() {
                        self.view = View::Timeline;
                    }
                }
                vec![]
            }
            Outcome::SignedIn(Ok(session)) => {
                self.session = Some(session);
                self.sign_in = SignInForm::default();
                self.view = View::Timeline;
                vec![]
            }
            Outcome::SignedIn(Err(e)) => {
                self.sign_in.pending = false;
                self.report(e);
                vec![]
            }
            Outcome::SignedOut(result) => {
                // Full reload: nothing from the signed-in view survives.
                let reloads = self.reloads + 1;
                *self = DiaryState::new(self.settings.clone());
                self.reloads = reloads;
                if let Err(e) = result {
                    self.report(e);
                }
                self.startup()
            }
            Outcome::Submitted(Ok(_)) => {
                self.submitting = false;
                self.draft = Draft::default();
                self.view = View::Timeline;
                self.loading = true;
                vec![Effect::FetchEntries]
            }
            Outcome::Submitted(Err(e)) => {
                self.submitting = false;
                self.report(e);
                vec![]
            }
            Outcome::PinPersisted { toggle, result: Ok(()) } => {
                self.pins.confirm(toggle);
                vec![]
            }
            Outcome::PinPersisted { toggle, result: Err(e) } => {
                self.pins.revert(&mut self.entries, toggle);
                self.report(e);
                self.loading = true;
                vec![Effect::FetchEntries]
            }
            Outcome::Session(Err(e)) | Outcome::Entries(Err(e)) => {
                self.loading = false;
                self.report(e);
                vec![]
            }
        }
    }

    pub fn apply_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::SignedIn(session) => self.session = Some(session),
            SessionEvent::SignedOut => {
                self.session = None;
                if matches!(self.view, View::Compose) {
                    self.view = View::Timeline;
                }
            }
        }
    }

    fn report(&mut self, err: DiaryError) {
        warn!("{err}");
        let message = err.to_string();
        match err.surface() {
            Surface::Banner => {
                // The first banner stays for the session.
                if self.banner.is_none() {
                    self.banner = Some(message);
                }
            }
            Surface::Inline => self.sign_in.error = Some(message),
            Surface::Alert => self.alert = Some(message),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn entries(&self) -> &[DiaryEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&DiaryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Entries matching the current search, in timeline order.
    pub fn visible_entries(&self) -> Vec<&DiaryEntry> {
        filter_entries(&self.entries, &self.query)
    }

    pub fn active_entry(&self) -> Option<&DiaryEntry> {
        match self.view {
            View::Detail(id) => self.entry(id),
            _ => None,
        }
    }

    pub fn display_date(&self, entry: &DiaryEntry) -> DisplayDate {
        display_date(entry.created_at, self.settings.utc_offset)
    }

    pub fn nav(&self) -> Nav {
        let signed_in = self.is_signed_in();
        Nav {
            new_entry: signed_in,
            sign_out: signed_in,
            sign_in: !signed_in,
            pin: signed_in,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn sign_in_form(&self) -> &SignInForm {
        &self.sign_in
    }

    pub fn sign_in_form_mut(&mut self) -> &mut SignInForm {
        &mut self.sign_in
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_pin_pending(&self, id: EntryId) -> bool {
        self.pins.is_pending(id)
    }

    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }
}

/// Case-insensitive substring match over title and content. An empty query
/// keeps everything, in order.
pub fn filter_entries<'a>(entries: &'a [DiaryEntry], query: &str) -> Vec<&'a DiaryEntry> {
    let query = query.to_lowercase();
    entries
        .iter()
        .filter(|e| {
            query.is_empty()
                || e.title.to_lowercase().contains(&query)
                || e.content.to_lowercase().contains(&query)
        })
        .collect()
}
