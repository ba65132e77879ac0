//! Event payload generation.

use chrono::{DateTime, Local, Utc};

use crate::event::{Event, EventDraft};

const PRODID: &str = "-//protocal//EN";
const UTC_LAYOUT: &str = "%Y%m%dT%H%M%SZ";
const DATE_LAYOUT: &str = "%Y%m%d";

/// Escape a free-text value for a payload line.
///
/// Backslashes are escaped first, then `;`, `,`, and newlines (which
/// become a literal `\n`). Carriage returns are dropped.
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Undo [`escape_text`]. Unknown escape sequences are kept verbatim.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(';') => out.push(';'),
            Some(',') => out.push(','),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Render a creation draft as a payload. The draft's generated UID
/// becomes the VEVENT UID.
pub fn generate_draft(draft: &EventDraft) -> String {
    render(
        &draft.uid,
        &draft.title,
        draft.description.as_deref(),
        draft.location.as_deref(),
        draft.start,
        draft.end,
        draft.all_day,
        &[],
    )
}

/// Render an existing event as a payload, keeping the UID it was
/// stored under. `custom_lines` are the lines carried over from the
/// stored payload; they are written back verbatim.
pub fn generate_event(uid: &str, event: &Event, custom_lines: &[String]) -> String {
    render(
        uid,
        &event.title,
        event.description.as_deref(),
        event.location.as_deref(),
        event.start,
        event.end,
        event.all_day,
        custom_lines,
    )
}

fn render(
    uid: &str,
    title: &str,
    description: Option<&str>,
    location: Option<&str>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    all_day: bool,
    custom_lines: &[String],
) -> String {
    let mut lines: Vec<String> = vec![
        "BEGIN:VCALENDAR".into(),
        "VERSION:2.0".into(),
        format!("PRODID:{PRODID}"),
        "BEGIN:VEVENT".into(),
        format!("UID:{uid}"),
        format!("DTSTAMP:{}", Utc::now().format(UTC_LAYOUT)),
    ];

    if all_day {
        // All-day boundaries are date values in the local calendar.
        lines.push(format!(
            "DTSTART;VALUE=DATE:{}",
            start.with_timezone(&Local).format(DATE_LAYOUT)
        ));
        lines.push(format!(
            "DTEND;VALUE=DATE:{}",
            end.with_timezone(&Local).format(DATE_LAYOUT)
        ));
    } else {
        lines.push(format!("DTSTART:{}", start.format(UTC_LAYOUT)));
        lines.push(format!("DTEND:{}", end.format(UTC_LAYOUT)));
    }

    lines.push(format!("SUMMARY:{}", escape_text(title)));
    if let Some(description) = description {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }
    if let Some(location) = location {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }

    // Already escaped in the stored payload; no re-escaping.
    lines.extend(custom_lines.iter().cloned());

    lines.push("END:VEVENT".into());
    lines.push("END:VCALENDAR".into());
    lines.push(String::new());

    lines.join("\r\n")
}
