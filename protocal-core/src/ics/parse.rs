//! Event payload parsing using the icalendar crate's parser.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use super::unescape_text;
use crate::datetime::{local_to_utc, resolve_in_zone};

/// Properties the generator writes itself; kept out of the carried
/// lines so an update does not emit them twice.
const GENERATED_PROPS: [&str; 7] = [
    "UID",
    "DTSTAMP",
    "DTSTART",
    "DTEND",
    "SUMMARY",
    "DESCRIPTION",
    "LOCATION",
];

/// One VEVENT extracted from a payload.
///
/// The UID is kept so an update can write the event back under the
/// identity it was stored with.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub uid: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    /// Content lines outside the fields above (attendees, recurrence
    /// rules, alarm blocks, X- properties), preserved for
    /// round-tripping on update.
    pub custom_lines: Vec<String>,
}

/// Parse a payload into its first VEVENT.
///
/// UID, DTSTART and DTEND are required; the free-text fields are each
/// optional and skipped individually when absent. Returns `None` when
/// the document or a required field cannot be read.
pub fn parse_event(content: &str) -> Option<ParsedEvent> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let vevent = calendar.components.iter().find(|c| c.name == "VEVENT")?;

    let uid = vevent.find_prop("UID")?.val.to_string();

    let start = DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?;
    let end = DatePerhapsTime::try_from(vevent.find_prop("DTEND")?).ok()?;
    let all_day = matches!(
        (&start, &end),
        (DatePerhapsTime::Date(_), DatePerhapsTime::Date(_))
    );

    let title = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()));
    let description = vevent
        .find_prop("DESCRIPTION")
        .map(|p| unescape_text(p.val.as_ref()));
    let location = vevent
        .find_prop("LOCATION")
        .map(|p| unescape_text(p.val.as_ref()));

    let mut custom_lines: Vec<String> = vevent
        .properties
        .iter()
        .filter(|p| !GENERATED_PROPS.contains(&p.name.as_ref()))
        .map(render_property)
        .collect();
    for component in &vevent.components {
        push_component(component, &mut custom_lines);
    }

    Some(ParsedEvent {
        uid,
        title,
        description,
        location,
        start: to_utc(start)?,
        end: to_utc(end)?,
        all_day,
        custom_lines,
    })
}

/// Reassemble a parsed property as a content line, parameters included.
fn render_property(prop: &Property) -> String {
    let mut line = prop.name.to_string();
    for param in &prop.params {
        line.push(';');
        line.push_str(param.key.as_ref());
        if let Some(val) = param.val.as_ref() {
            line.push('=');
            line.push_str(val.as_ref());
        }
    }
    line.push(':');
    line.push_str(prop.val.as_ref());
    line
}

/// Reassemble a nested component (VALARM and friends) as content lines.
fn push_component(component: &Component, lines: &mut Vec<String>) {
    lines.push(format!("BEGIN:{}", component.name.as_ref()));
    for prop in &component.properties {
        lines.push(render_property(prop));
    }
    for nested in &component.components {
        push_component(nested, lines);
    }
    lines.push(format!("END:{}", component.name.as_ref()));
}

/// Collapse an icalendar time to a UTC instant.
///
/// DATE values and floating times are interpreted in the machine's
/// local timezone; a TZID that chrono-tz does not know falls back to
/// local as well.
fn to_utc(value: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match value {
        DatePerhapsTime::Date(date) => local_to_utc(date.and_hms_opt(0, 0, 0)?),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(instant)) => Some(instant),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => local_to_utc(naive),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            match tzid.parse::<Tz>() {
                Ok(tz) => resolve_in_zone(&tz, date_time),
                Err(_) => local_to_utc(date_time),
            }
        }
    }
}
