use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Reverse;

pub type EntryId = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Happy,
    Sad,
    Excited,
    Calm,
    #[serde(other)]
    Other,
}

impl Mood {
    /// Moods offered by the submission form.
    pub const CHOICES: [Mood; 4] = [Mood::Happy, Mood::Sad, Mood::Excited, Mood::Calm];

    pub fn label(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Excited => "excited",
            Mood::Calm => "calm",
            Mood::Other => "meh",
        }
    }

    pub fn next(self) -> Self {
        cycle(&Self::CHOICES, self, 1)
    }

    pub fn prev(self) -> Self {
        cycle(&Self::CHOICES, self, Self::CHOICES.len() - 1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    #[default]
    Sunny,
    Cloudy,
    Rain,
    #[serde(other)]
    Other,
}

impl Weather {
    pub const CHOICES: [Weather; 3] = [Weather::Sunny, Weather::Cloudy, Weather::Rain];

    pub fn label(self) -> &'static str {
        match self {
            Weather::Sunny | Weather::Other => "sunny",
            Weather::Cloudy => "cloudy",
            Weather::Rain => "rain",
        }
    }

    pub fn next(self) -> Self {
        cycle(&Self::CHOICES, self, 1)
    }

    pub fn prev(self) -> Self {
        cycle(&Self::CHOICES, self, Self::CHOICES.len() - 1)
    }
}

fn cycle<T: Copy + PartialEq>(choices: &[T], current: T, step: usize) -> T {
    let at = choices.iter().position(|c| *c == current).unwrap_or(0);
    choices[(at + step) % choices.len()]
}

/// One diary record as stored in the `entries` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: EntryId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub mood: Mood,
    pub weather: Weather,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_top: bool,
}

impl DiaryEntry {
    pub fn is_pinned(&self) -> bool {
        self.is_top
    }

    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Insert payload. The backend assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    pub mood: Mood,
    pub weather: Weather,
    pub location: Option<String>,
    pub images: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Pinned entries first, then newest first. Stable, so equal keys keep their
/// fetched order.
pub fn sort_entries(entries: &mut [DiaryEntry]) {
    entries.sort_by_key(|e| (Reverse(e.is_top), Reverse(e.created_at)));
}

/// Wraps plain draft text as a single HTML paragraph.
pub fn paragraph(text: &str) -> String {
    let mut html = String::with_capacity(text.len() + 7);
    html.push_str("<p>");
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            html.push_str("<br>");
        }
        for c in line.chars() {
            match c {
                '&' => html.push_str("&amp;"),
                '<' => html.push_str("&lt;"),
                '>' => html.push_str("&gt;"),
                _ => html.push(c),
            }
        }
    }
    html.push_str("</p>");
    html
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn entry(id: EntryId, title: &str, minutes: i64, pinned: bool) -> DiaryEntry {
        DiaryEntry {
            id,
            title: title.to_string(),
            content: format!("<p>{title} body</p>"),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(minutes),
            mood: Mood::Happy,
            weather: Weather::Sunny,
            location: None,
            images: Vec::new(),
            is_top: pinned,
        }
    }

    fn ids(entries: &[DiaryEntry]) -> Vec<EntryId> {
        entries.iter().map(|e| e.id).collect()
    }

    #[test]
    fn pinned_entries_come_first_regardless_of_age() {
        let mut entries = vec![
            entry(1, "newest", 300, false),
            entry(2, "old pinned", 10, true),
            entry(3, "middle", 200, false),
            entry(4, "new pinned", 250, true),
        ];
        sort_entries(&mut entries);
        assert_eq!(ids(&entries), vec![4, 2, 1, 3]);
    }

    #[test]
    fn sorting_is_stable_for_identical_keys() {
        let mut entries = vec![entry(7, "a", 5, false), entry(8, "b", 5, false)];
        sort_entries(&mut entries);
        assert_eq!(ids(&entries), vec![7, 8]);
    }

    #[test]
    fn rows_with_null_flags_and_images_decode() {
        let row = r#"{
            "id": 3,
            "title": "rain",
            "content": "<p>wet</p>",
            "created_at": "2024-05-15T02:30:00+00:00",
            "mood": "sad",
            "weather": "rain",
            "location": null,
            "images": null,
            "is_top": null
        }"#;
        let entry: DiaryEntry = serde_json::from_str(row).unwrap();
        assert!(!entry.is_top);
        assert!(entry.images.is_empty());
        assert_eq!(entry.location, None);
        assert_eq!(entry.mood, Mood::Sad);
    }

    #[test]
    fn rows_from_early_revisions_without_pin_column_decode() {
        let row = r#"{"id":1,"title":"t","content":"c","created_at":"2024-05-15T02:30:00Z",
                      "mood":"grumpy","weather":"snow","images":["https://x/y.png"]}"#;
        let entry: DiaryEntry = serde_json::from_str(row).unwrap();
        assert!(!entry.is_top);
        assert_eq!(entry.mood, Mood::Other);
        assert_eq!(entry.weather, Weather::Other);
        assert_eq!(entry.cover_image(), Some("https://x/y.png"));
    }

    #[test]
    fn paragraph_wraps_and_escapes() {
        assert_eq!(paragraph("C"), "<p>C</p>");
        assert_eq!(paragraph("a < b & c"), "<p>a &lt; b &amp; c</p>");
        assert_eq!(paragraph("line one\nline two"), "<p>line one<br>line two</p>");
    }

    #[test]
    fn form_choices_cycle_in_both_directions() {
        assert_eq!(Mood::Calm.next(), Mood::Happy);
        assert_eq!(Mood::Happy.prev(), Mood::Calm);
        assert_eq!(Weather::Rain.next(), Weather::Sunny);
        assert_eq!(Weather::Other.next(), Weather::Cloudy);
    }
}
