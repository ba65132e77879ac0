//! Calendar snapshots and calendar selection.

use serde::{Deserialize, Serialize};

use crate::error::{CalError, CalResult};

/// A calendar as reported by the service. Read-only snapshot; the CLI
/// never mutates calendars themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub is_owned: bool,
    #[serde(default)]
    pub is_primary: bool,
}

/// Which calendar a command should operate on.
///
/// Empty strings count as "not given", so blank CLI flags fall through
/// to the defaults.
#[derive(Debug, Clone, Default)]
pub struct CalendarSelector {
    id: Option<String>,
    name: Option<String>,
}

impl CalendarSelector {
    pub fn new(id: Option<String>, name: Option<String>) -> Self {
        CalendarSelector {
            id: id.filter(|v| !v.is_empty()),
            name: name.filter(|v| !v.is_empty()),
        }
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new(Some(id.into()), None)
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self::new(None, Some(name.into()))
    }

    /// Resolve exactly one calendar from the service's list.
    ///
    /// Precedence: explicit id, explicit name (case-insensitive), the
    /// first primary calendar, the first owned calendar, then the first
    /// calendar in list order.
    pub fn choose(&self, calendars: &[Calendar]) -> CalResult<Calendar> {
        if calendars.is_empty() {
            return Err(CalError::NoCalendarsAvailable);
        }

        if let Some(id) = &self.id {
            return calendars
                .iter()
                .find(|calendar| &calendar.id == id)
                .cloned()
                .ok_or_else(|| CalError::CalendarIdNotFound(id.clone()));
        }

        if let Some(name) = &self.name {
            let wanted = name.to_lowercase();
            return calendars
                .iter()
                .find(|calendar| calendar.name.to_lowercase() == wanted)
                .cloned()
                .ok_or_else(|| CalError::CalendarNameNotFound(name.clone()));
        }

        if let Some(primary) = calendars.iter().find(|calendar| calendar.is_primary) {
            return Ok(primary.clone());
        }

        if let Some(owned) = calendars.iter().find(|calendar| calendar.is_owned) {
            return Ok(owned.clone());
        }

        Ok(calendars[0].clone())
    }
}
