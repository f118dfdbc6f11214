//! Read-time presentation helpers: calendar fields for the timeline and
//! terminal text for stored HTML content.

use chrono::{DateTime, Datelike, FixedOffset, Utc, Weekday};
use unicode_width::UnicodeWidthChar;

/// Calendar fields shown next to an entry. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayDate {
    pub year: String,
    pub month: String,
    pub day: String,
    pub weekday: &'static str,
    pub time: String,
    pub date: String,
}

/// Normalizes a server instant into display fields at a fixed offset.
///
/// The host timezone is never consulted, so the same instant always renders
/// the same way.
///
/// ```
/// # use chrono::{FixedOffset, TimeZone, Utc};
/// # use memory_lane::display::display_date;
/// let instant = Utc.with_ymd_and_hms(2024, 5, 14, 17, 5, 0).unwrap();
/// let shown = display_date(instant, FixedOffset::east_opt(8 * 3600).unwrap());
///
/// assert_eq!(shown.date, "2024-05-15");
/// assert_eq!(shown.weekday, "周三");
/// assert_eq!(shown.time, "01:05");
/// ```
pub fn display_date(instant: DateTime<Utc>, offset: FixedOffset) -> DisplayDate {
    let local = instant.with_timezone(&offset);
    DisplayDate {
        year: local.format("%Y").to_string(),
        month: local.format("%m").to_string(),
        day: local.format("%d").to_string(),
        weekday: weekday_label(local.weekday()),
        time: local.format("%H:%M").to_string(),
        date: local.format("%Y-%m-%d").to_string(),
    }
}

fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "周一",
        Weekday::Tue => "周二",
        Weekday::Wed => "周三",
        Weekday::Thu => "周四",
        Weekday::Fri => "周五",
        Weekday::Sat => "周六",
        Weekday::Sun => "周日",
    }
}

/// Renders an HTML fragment as terminal text. Paragraphs and `<br>` become
/// line breaks; every other tag is dropped.
pub fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        out.push_str(&decode_entities(&rest[..start]));
        let Some(end) = rest[start..].find('>') else {
            // Unterminated tag, keep it as text.
            out.push_str(&decode_entities(&rest[start..]));
            rest = "";
            break;
        };
        let tag = rest[start + 1..start + end].trim().to_ascii_lowercase();
        if tag == "/p" || tag.starts_with("br") {
            out.push('\n');
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(&decode_entities(rest));

    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Clips `text` to `width` terminal columns, marking the cut with an ellipsis.
pub fn excerpt(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    let mut used = 0;
    let mut out = String::new();
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width.saturating_sub(1) {
            out.push('…');
            return out;
        }
        used += w;
        out.push(c);
    }
    if text.lines().nth(1).is_some() && used < width {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn east(hours: i32) -> FixedOffset {
        FixedOffset::east_opt(hours * 3600).unwrap()
    }

    #[test]
    fn fields_are_zero_padded() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 5, 3, 7, 0).unwrap();
        let shown = display_date(instant, east(0));
        assert_eq!(shown.year, "2024");
        assert_eq!(shown.month, "01");
        assert_eq!(shown.day, "05");
        assert_eq!(shown.time, "03:07");
        assert_eq!(shown.weekday, "周五");
    }

    #[test]
    fn offset_can_move_the_calendar_day() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 12, 18, 0, 0).unwrap();
        assert_eq!(display_date(instant, east(0)).day, "12");
        assert_eq!(display_date(instant, east(8)).day, "13");
        assert_eq!(display_date(instant, east(8)).weekday, "周一");
    }

    #[test]
    fn plain_text_keeps_paragraph_breaks() {
        let html = "\n      <p>First &amp; foremost.</p>\n      <p>Second<br>line</p>\n";
        assert_eq!(plain_text(html), "First & foremost.\nSecond\nline");
    }

    #[test]
    fn plain_text_drops_unknown_tags() {
        assert_eq!(plain_text("<p><b>bold</b> &lt;3</p>"), "bold <3");
    }

    #[test]
    fn excerpt_respects_wide_characters() {
        assert_eq!(excerpt("雨天和猫", 5), "雨天…");
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("one\ntwo", 10), "one…");
    }
}
