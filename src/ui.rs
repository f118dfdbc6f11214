use crate::diary_entry::{DiaryEntry, Mood, Weather};
use crate::diary_state::{Action, DiaryState, View};
use crate::display::{excerpt, plain_text};
use color_eyre::Result;
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{stdout, Stdout};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy)]
struct Palette {
    bg: Color,
    fg: Color,
    accent: Color,
    muted: Color,
}

impl Palette {
    fn for_mode(dark: bool) -> Self {
        if dark {
            Palette {
                bg: Color::Rgb(26, 27, 30),
                fg: Color::Rgb(226, 232, 240),
                accent: Color::Rgb(251, 113, 133),
                muted: Color::Rgb(100, 116, 139),
            }
        } else {
            Palette {
                bg: Color::Rgb(248, 245, 242),
                fg: Color::Rgb(30, 41, 59),
                accent: Color::Rgb(244, 63, 94),
                muted: Color::Rgb(100, 116, 139),
            }
        }
    }

    fn base(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    fn title(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .bg(self.bg)
            .add_modifier(Modifier::BOLD)
    }

    fn hint(&self) -> Style {
        Style::default().fg(self.muted).bg(self.bg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComposeField {
    Title,
    Content,
    Mood,
    Weather,
    Location,
    Image,
}

impl ComposeField {
    const ORDER: [ComposeField; 6] = [
        ComposeField::Title,
        ComposeField::Content,
        ComposeField::Mood,
        ComposeField::Weather,
        ComposeField::Location,
        ComposeField::Image,
    ];

    fn shift(self, step: usize) -> Self {
        let at = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(at + step) % Self::ORDER.len()]
    }
}

/// Widget state kept by the UI rather than the diary.
#[derive(Debug)]
struct Focus {
    list_state: ListState,
    searching: bool,
    password_focused: bool,
    compose_field: ComposeField,
    reloads: u64,
}

impl Default for Focus {
    fn default() -> Self {
        Focus {
            list_state: ListState::default().with_selected(Some(0)),
            searching: false,
            password_focused: false,
            compose_field: ComposeField::Title,
            reloads: 0,
        }
    }
}

impl Focus {
    /// Starts over when the diary state has been rebuilt.
    fn follow(&mut self, state: &DiaryState) {
        if self.reloads != state.reloads() {
            *self = Focus {
                reloads: state.reloads(),
                ..Focus::default()
            };
        }
    }
}

pub struct UI {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    focus: Focus,
}

impl UI {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout());
        let terminal = Terminal::new(backend)?;

        Ok(UI {
            terminal,
            focus: Focus::default(),
        })
    }

    pub fn display(&mut self, state: &DiaryState) -> Result<()> {
        let UI { terminal, focus } = self;
        focus.follow(state);
        let Focus {
            list_state,
            searching,
            password_focused,
            compose_field,
            ..
        } = focus;
        let visible = state.visible_entries().len();
        clamp_selection(list_state, visible);

        terminal.draw(|f| {
            let palette = Palette::for_mode(state.dark_mode());
            f.render_widget(Block::default().style(palette.base()), f.area());

            let banner_height = if state.banner().is_some() { 1 } else { 0 };
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(1)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Length(banner_height),
                    Constraint::Min(0),
                    Constraint::Length(1),
                ])
                .split(f.area());

            render_header(f, chunks[0], state, *searching, palette);
            if let Some(banner) = state.banner() {
                let line = Paragraph::new(banner).style(
                    Style::default()
                        .fg(Color::White)
                        .bg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                );
                f.render_widget(line, chunks[1]);
            }

            match state.view() {
                View::Timeline => render_timeline(f, chunks[2], state, list_state, palette),
                View::Detail(_) => render_detail(f, chunks[2], state, palette),
                View::SignIn => render_sign_in(f, chunks[2], state, *password_focused, palette),
                View::Compose => render_compose(f, chunks[2], state, *compose_field, palette),
            }

            render_footer(f, chunks[3], state, *searching, palette);
        })?;

        Ok(())
    }

    /// Maps a key press to an action. Form text is edited in place.
    pub fn handle_key(&mut self, key: KeyEvent, state: &mut DiaryState) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }
        self.focus.follow(state);
        match state.view() {
            View::Timeline if self.focus.searching => self.search_key(key, state),
            View::Timeline => self.timeline_key(key, state),
            View::Detail(_) => match key.code {
                KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => Some(Action::Back),
                KeyCode::Char('q') => Some(Action::Quit),
                KeyCode::Char('d') => Some(Action::ToggleDarkMode),
                _ => None,
            },
            View::SignIn => self.sign_in_key(key, state),
            View::Compose => self.compose_key(key, state),
        }
    }

    fn search_key(&mut self, key: KeyEvent, state: &DiaryState) -> Option<Action> {
        let mut query = state.query().to_string();
        match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                self.focus.searching = false;
                return None;
            }
            KeyCode::Char(c) => query.push(c),
            KeyCode::Backspace => {
                query.pop();
            }
            _ => return None,
        }
        self.focus.list_state.select(Some(0));
        Some(Action::SetQuery(query))
    }

    fn timeline_key(&mut self, key: KeyEvent, state: &DiaryState) -> Option<Action> {
        let visible = state.visible_entries();
        let selected = self
            .focus
            .list_state
            .selected()
            .and_then(|i| visible.get(i))
            .map(|e| e.id);
        let nav = state.nav();

        match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('/') => {
                self.focus.searching = true;
                None
            }
            KeyCode::Esc if !state.query().is_empty() => Some(Action::SetQuery(String::new())),
            KeyCode::Esc => Some(Action::DismissAlert),
            KeyCode::Up | KeyCode::Char('k') => {
                self.focus.list_state.select_previous();
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.focus.list_state.select_next();
                None
            }
            KeyCode::Enter => selected.map(Action::Open),
            KeyCode::Char('p') if nav.pin => selected.map(Action::TogglePin),
            KeyCode::Char('d') => Some(Action::ToggleDarkMode),
            KeyCode::Char('r') => Some(Action::Refresh),
            KeyCode::Char('n') if nav.new_entry => Some(Action::Compose),
            KeyCode::Char('l') if nav.sign_in => Some(Action::ShowSignIn),
            KeyCode::Char('o') if nav.sign_out => Some(Action::SignOut),
            _ => None,
        }
    }

    fn sign_in_key(&mut self, key: KeyEvent, state: &mut DiaryState) -> Option<Action> {
        let form = state.sign_in_form_mut();
        let field = if self.focus.password_focused {
            &mut form.password
        } else {
            &mut form.email
        };
        match key.code {
            KeyCode::Esc => {
                self.focus.password_focused = false;
                return Some(Action::Back);
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.focus.password_focused = !self.focus.password_focused;
            }
            KeyCode::Enter if !self.focus.password_focused => self.focus.password_focused = true,
            KeyCode::Enter => return Some(Action::SignIn),
            KeyCode::Char(c) => field.push(c),
            KeyCode::Backspace => {
                field.pop();
            }
            _ => {}
        }
        None
    }

    fn compose_key(&mut self, key: KeyEvent, state: &mut DiaryState) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
            return Some(Action::Submit);
        }
        let draft = state.draft_mut();
        match (self.focus.compose_field, key.code) {
            (_, KeyCode::Esc) => {
                self.focus.compose_field = ComposeField::Title;
                return Some(Action::Back);
            }
            (_, KeyCode::Tab) => self.focus.compose_field = self.focus.compose_field.shift(1),
            (_, KeyCode::BackTab) => {
                let back = ComposeField::ORDER.len() - 1;
                self.focus.compose_field = self.focus.compose_field.shift(back)
            }
            (ComposeField::Content, KeyCode::Enter) => draft.content.push('\n'),
            (_, KeyCode::Enter) => self.focus.compose_field = self.focus.compose_field.shift(1),
            (ComposeField::Mood, KeyCode::Right) => draft.mood = draft.mood.next(),
            (ComposeField::Mood, KeyCode::Left) => draft.mood = draft.mood.prev(),
            (ComposeField::Weather, KeyCode::Right) => draft.weather = draft.weather.next(),
            (ComposeField::Weather, KeyCode::Left) => draft.weather = draft.weather.prev(),
            (ComposeField::Title, KeyCode::Char(c)) => draft.title.push(c),
            (ComposeField::Content, KeyCode::Char(c)) => draft.content.push(c),
            (ComposeField::Location, KeyCode::Char(c)) => draft.location.push(c),
            (ComposeField::Image, KeyCode::Char(c)) => {
                let mut path = image_text(&draft.image);
                path.push(c);
                draft.image = Some(PathBuf::from(path));
            }
            (ComposeField::Title, KeyCode::Backspace) => {
                draft.title.pop();
            }
            (ComposeField::Content, KeyCode::Backspace) => {
                draft.content.pop();
            }
            (ComposeField::Location, KeyCode::Backspace) => {
                draft.location.pop();
            }
            (ComposeField::Image, KeyCode::Backspace) => {
                let mut path = image_text(&draft.image);
                path.pop();
                draft.image = (!path.is_empty()).then(|| PathBuf::from(path));
            }
            _ => {}
        }
        None
    }
}

fn image_text(image: &Option<PathBuf>) -> String {
    image
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn clamp_selection(list_state: &mut ListState, len: usize) {
    match (list_state.selected(), len) {
        (_, 0) => list_state.select(None),
        (None, _) => list_state.select(Some(0)),
        (Some(i), len) if i >= len => list_state.select(Some(len - 1)),
        _ => {}
    }
}

fn mood_glyph(mood: Mood) -> &'static str {
    match mood {
        Mood::Happy => "☺",
        Mood::Sad => "☹",
        Mood::Excited => "♥",
        Mood::Calm | Mood::Other => "~",
    }
}

fn weather_glyph(weather: Weather) -> &'static str {
    match weather {
        Weather::Sunny | Weather::Other => "☀",
        Weather::Cloudy => "☁",
        Weather::Rain => "☂",
    }
}

fn render_header(f: &mut Frame, area: Rect, state: &DiaryState, searching: bool, palette: Palette) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(32)])
        .split(area);

    let mut title = vec![
        Span::styled("Memory", palette.base().add_modifier(Modifier::BOLD)),
        Span::styled("Lane", palette.title()),
    ];
    if let Some(email) = state.session().and_then(|s| s.user.email.as_deref()) {
        title.push(Span::styled(format!("  {email}"), palette.hint()));
    }
    let brand = Paragraph::new(Line::from(title))
        .block(Block::default().borders(Borders::BOTTOM).style(palette.base()));
    f.render_widget(brand, chunks[0]);

    let search_style = if searching {
        Style::default().fg(palette.accent).bg(palette.bg)
    } else {
        palette.hint()
    };
    let query = if state.query().is_empty() && !searching {
        "/ to search memories...".to_string()
    } else {
        state.query().to_string()
    };
    let search = Paragraph::new(query).style(search_style).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(search_style)
            .title("Search"),
    );
    f.render_widget(search, chunks[1]);
}

fn render_timeline(
    f: &mut Frame,
    area: Rect,
    state: &DiaryState,
    list_state: &mut ListState,
    palette: Palette,
) {
    let visible = state.visible_entries();
    if visible.is_empty() {
        let message = if state.is_loading() {
            "Loading..."
        } else {
            "No memories recorded for this stretch of time yet..."
        };
        let empty = Paragraph::new(message)
            .style(palette.hint())
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Timeline"));
        f.render_widget(empty, area);
        return;
    }

    let width = area.width.saturating_sub(8) as usize;
    let items: Vec<ListItem> = visible
        .iter()
        .map(|entry| timeline_item(state, entry, width, palette))
        .collect();

    let list = List::new(items)
        .style(palette.base())
        .block(Block::default().borders(Borders::ALL).title("Timeline"))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, area, list_state);
}

fn timeline_item<'a>(
    state: &DiaryState,
    entry: &DiaryEntry,
    width: usize,
    palette: Palette,
) -> ListItem<'a> {
    let date = state.display_date(entry);
    let mut heading = vec![Span::styled(
        format!("{}/{} {} {}  ", date.month, date.day, date.weekday, date.year),
        Style::default().fg(palette.accent),
    )];
    if entry.is_pinned() {
        heading.push(Span::styled("[pinned] ", palette.title()));
    }
    if state.is_pin_pending(entry.id) {
        heading.push(Span::styled("… ", palette.hint()));
    }
    heading.push(Span::styled(
        excerpt(&entry.title, width.saturating_sub(24)),
        Style::default().add_modifier(Modifier::BOLD),
    ));

    let mut meta = format!("{} {}", mood_glyph(entry.mood), weather_glyph(entry.weather));
    if let Some(location) = &entry.location {
        meta.push_str(&format!("  {location}"));
    }
    if entry.cover_image().is_some() {
        meta.push_str(&format!("  [{} image]", entry.images.len()));
    }

    ListItem::new(vec![
        Line::from(heading),
        Line::from(Span::styled(meta, palette.hint())),
        Line::from(Span::raw(excerpt(&plain_text(&entry.content), width))),
        Line::from(""),
    ])
}

fn render_detail(f: &mut Frame, area: Rect, state: &DiaryState, palette: Palette) {
    let Some(entry) = state.active_entry() else {
        return;
    };
    let date = state.display_date(entry);

    let mut lines = vec![
        Line::from(Span::styled(entry.title.clone(), palette.title())),
        Line::from(Span::styled(
            format!(
                "{}.{}.{} {} {}   mood {} {}   weather {} {}",
                date.year,
                date.month,
                date.day,
                date.weekday,
                date.time,
                mood_glyph(entry.mood),
                entry.mood.label(),
                weather_glyph(entry.weather),
                entry.weather.label(),
            ),
            palette.hint(),
        )),
    ];
    if let Some(location) = &entry.location {
        lines.push(Line::from(Span::styled(format!("@ {location}"), palette.hint())));
    }
    lines.push(Line::from(""));
    for url in &entry.images {
        lines.push(Line::from(Span::styled(
            url.clone(),
            Style::default().fg(palette.accent).add_modifier(Modifier::UNDERLINED),
        )));
    }
    if !entry.images.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Captured on {}", date.date),
            palette.hint().add_modifier(Modifier::ITALIC),
        )));
        lines.push(Line::from(""));
    }
    for paragraph in plain_text(&entry.content).lines() {
        lines.push(Line::from(paragraph.to_string()));
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled("End of Entry", palette.hint())).alignment(Alignment::Center));

    let detail = Paragraph::new(lines)
        .style(palette.base())
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Entry"));
    f.render_widget(detail, area);
}

fn render_sign_in(
    f: &mut Frame,
    area: Rect,
    state: &DiaryState,
    password_focused: bool,
    palette: Palette,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Min(0),
        ])
        .split(area);

    let form = state.sign_in_form();
    let focus = |focused: bool| {
        if focused {
            Style::default().fg(palette.accent).bg(palette.bg)
        } else {
            palette.base()
        }
    };

    let email = Paragraph::new(form.email.clone()).style(palette.base()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus(!password_focused))
            .title("Email"),
    );
    f.render_widget(email, chunks[0]);

    let password = Paragraph::new("*".repeat(form.password.chars().count()))
        .style(palette.base())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(focus(password_focused))
                .title("Password"),
        );
    f.render_widget(password, chunks[1]);

    let status = match (&form.error, form.pending) {
        (_, true) => Line::from(Span::styled("Signing in...", palette.hint())),
        (Some(error), _) => Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))),
        (None, false) => Line::from(""),
    };
    f.render_widget(Paragraph::new(status).style(palette.base()), chunks[2]);
}

fn render_compose(
    f: &mut Frame,
    area: Rect,
    state: &DiaryState,
    field: ComposeField,
    palette: Palette,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);
    let tags = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[2]);

    let draft = state.draft();
    let boxed = |title: &'static str, focused: bool| {
        let border = if focused {
            Style::default().fg(palette.accent).bg(palette.bg)
        } else {
            palette.base()
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title)
    };

    f.render_widget(
        Paragraph::new(draft.title.clone())
            .style(palette.base())
            .block(boxed("Title", field == ComposeField::Title)),
        chunks[0],
    );
    f.render_widget(
        Paragraph::new(draft.content.clone())
            .style(palette.base())
            .wrap(Wrap { trim: false })
            .block(boxed("Content", field == ComposeField::Content)),
        chunks[1],
    );
    f.render_widget(
        Paragraph::new(format!("< {} {} >", mood_glyph(draft.mood), draft.mood.label()))
            .style(palette.base())
            .block(boxed("Mood", field == ComposeField::Mood)),
        tags[0],
    );
    f.render_widget(
        Paragraph::new(format!(
            "< {} {} >",
            weather_glyph(draft.weather),
            draft.weather.label()
        ))
        .style(palette.base())
        .block(boxed("Weather", field == ComposeField::Weather)),
        tags[1],
    );
    f.render_widget(
        Paragraph::new(draft.location.clone())
            .style(palette.base())
            .block(boxed("Location (optional)", field == ComposeField::Location)),
        chunks[3],
    );
    f.render_widget(
        Paragraph::new(image_text(&draft.image))
            .style(palette.base())
            .block(boxed("Image file (optional)", field == ComposeField::Image)),
        chunks[4],
    );
}

fn render_footer(f: &mut Frame, area: Rect, state: &DiaryState, searching: bool, palette: Palette) {
    if let Some(alert) = state.alert() {
        let line = Paragraph::new(alert).style(Style::default().fg(Color::Yellow).bg(palette.bg));
        f.render_widget(line, area);
        return;
    }

    let key = |k: &'static str| Span::styled(k, palette.title());
    let text = |t: &'static str| Span::styled(t, palette.hint());
    let nav = state.nav();

    let mut spans = Vec::new();
    match state.view() {
        View::Timeline if searching => {
            spans.extend([key("Enter"), text(" done  "), key("Backspace"), text(" erase")]);
        }
        View::Timeline => {
            spans.extend([key("Enter"), text(" open  "), key("/"), text(" search  ")]);
            if nav.pin {
                spans.extend([key("p"), text(" pin  ")]);
            }
            if nav.new_entry {
                spans.extend([key("n"), text(" new entry  ")]);
            }
            if nav.sign_in {
                spans.extend([key("l"), text(" sign in  ")]);
            }
            if nav.sign_out {
                spans.extend([key("o"), text(" sign out  ")]);
            }
            spans.extend([key("d"), text(" dark mode  "), key("q"), text(" quit")]);
        }
        View::Detail(_) => {
            spans.extend([key("Esc"), text(" back to timeline  "), key("q"), text(" quit")]);
        }
        View::SignIn => {
            spans.extend([key("Tab"), text(" switch field  "), key("Enter"), text(" sign in  ")]);
            spans.extend([key("Esc"), text(" cancel")]);
        }
        View::Compose if state.is_submitting() => spans.push(text("Saving...")),
        View::Compose => {
            spans.extend([key("Tab"), text(" next field  "), key("←/→"), text(" mood/weather  ")]);
            spans.extend([key("Ctrl+S"), text(" publish  "), key("Esc"), text(" back")]);
        }
    }
    f.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
        area,
    );
}

impl Drop for UI {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
    }
}
