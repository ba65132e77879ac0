//! Textual event payload codec.
//!
//! Events cross the bridge as VCALENDAR/VEVENT documents. Generation
//! builds the exact envelope the service expects; parsing extracts the
//! first VEVENT back into structured form.

mod generate;
mod parse;

pub use generate::{escape_text, generate_draft, generate_event, unescape_text};
pub use parse::{ParsedEvent, parse_event};
