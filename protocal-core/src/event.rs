//! Structured calendar events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::{local_midnight, next_local_day};
use crate::error::{CalError, CalResult};
use crate::ics::ParsedEvent;

/// A calendar event in structured form.
///
/// Snapshots are immutable: an update produces a new `Event` rather
/// than mutating one in place. Timestamps are UTC; `all_day` records
/// that both boundaries sit on local midnights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub calendar_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
}

impl Event {
    /// Assemble an event from its envelope identity and decoded
    /// payload.
    pub fn from_payload(id: String, calendar_id: String, parsed: ParsedEvent) -> Event {
        Event {
            id,
            calendar_id,
            title: parsed.title.unwrap_or_default(),
            description: parsed.description,
            location: parsed.location,
            start: parsed.start,
            end: parsed.end,
            all_day: parsed.all_day,
        }
    }
}

/// Input for creating an event, before it has a server identity.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub uid: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
}

impl EventDraft {
    /// Build a creation draft.
    ///
    /// A missing end defaults to one hour after the start, or to the
    /// next day for all-day events. All-day boundaries are then snapped
    /// to local midnight, widening a collapsed range to a full day
    /// before the final start < end check.
    pub fn new(
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        all_day: bool,
    ) -> CalResult<Self> {
        let mut start = start;
        let mut end = end.unwrap_or_else(|| {
            if all_day {
                next_local_day(start)
            } else {
                start + Duration::hours(1)
            }
        });

        if all_day {
            start = local_midnight(start);
            end = local_midnight(end);
            if start >= end {
                end = next_local_day(start);
            }
        }

        if start >= end {
            return Err(CalError::InvalidRange);
        }

        Ok(EventDraft {
            uid: generate_uid(),
            title: title.into(),
            description: None,
            location: None,
            start,
            end,
            all_day,
        })
    }
}

/// Unique VEVENT identifier: wall-clock nanoseconds plus a random
/// suffix, so no server round-trip is needed for uniqueness.
fn generate_uid() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}-{}@protocal", nanos, Uuid::new_v4().simple())
}
