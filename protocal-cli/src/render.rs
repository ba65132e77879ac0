//! JSON document rendering.
//!
//! Success output is pretty-printed JSON on stdout and nothing else, so
//! the CLI composes with jq and scripts. Errors go to stderr as a
//! single `{"error": ...}` document.

use protocal_core::calendar::Calendar;
use protocal_core::event::Event;
use protocal_core::session::WriteOutcome;
use serde::Serialize;
use serde_json::{Value, json};

pub fn print_json<T: Serialize>(value: &T) {
    if let Ok(rendered) = serde_json::to_string_pretty(value) {
        println!("{rendered}");
    }
}

pub fn print_calendars(calendars: &[Calendar]) {
    print_json(&calendars);
}

pub fn print_events(events: &[Event]) {
    print_json(&events);
}

pub fn print_event(event: &Event) {
    print_json(event);
}

/// After a write: the re-read event, or its bare identity plus a status
/// marker when the re-read did not produce one.
pub fn print_outcome(outcome: &WriteOutcome, status: &str) {
    print_json(&outcome_document(outcome, status));
}

fn outcome_document(outcome: &WriteOutcome, status: &str) -> Value {
    match outcome {
        WriteOutcome::Event(event) => serde_json::to_value(event).unwrap_or(Value::Null),
        WriteOutcome::Reference(reference) => json!({
            "id": reference.id,
            "calendarId": reference.calendar_id,
            "status": status,
        }),
    }
}

pub fn print_deleted(id: &str) {
    print_json(&json!({"id": id, "status": "deleted"}));
}

pub fn print_error(err: &anyhow::Error) {
    let document = json!({"error": format!("{err:#}")});
    eprintln!("{document:#}");
}
