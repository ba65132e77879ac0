//! Partial event updates.

use chrono::{DateTime, Utc};

use crate::error::{CalError, CalResult};
use crate::event::Event;

/// Requested field changes for an update.
///
/// `None` leaves a field untouched; `Some` replaces it. There is no way
/// to clear a field back to absent, matching the flag surface of the
/// CLI where an empty value means "not requested".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.start.is_none()
            && self.end.is_none()
    }

    /// Merge the patch onto an existing event, yielding the updated
    /// snapshot.
    ///
    /// A new start without a new end shifts the end to preserve the
    /// original duration. The all-day flag always survives from the
    /// original; the resulting range must still satisfy start < end.
    pub fn apply(&self, event: &Event) -> CalResult<Event> {
        if self.is_empty() {
            return Err(CalError::NoChangeRequested);
        }

        let mut updated = event.clone();

        if let Some(title) = &self.title {
            updated.title = title.clone();
        }
        if let Some(description) = &self.description {
            updated.description = Some(description.clone());
        }
        if let Some(location) = &self.location {
            updated.location = Some(location.clone());
        }

        if self.start.is_some() || self.end.is_some() {
            let duration = event.end - event.start;

            if let Some(start) = self.start {
                updated.start = start;
                if self.end.is_none() {
                    updated.end = start + duration;
                }
            }
            if let Some(end) = self.end {
                updated.end = end;
            }

            if updated.start >= updated.end {
                return Err(CalError::InvalidRange);
            }
        }

        Ok(updated)
    }
}
