//! Core library for protocal: the session establishment pipeline, the
//! structured event model, the payload codec, and the JSON protocol
//! spoken to the bridge executable.

pub mod calendar;
pub mod credential;
pub mod datetime;
pub mod error;
pub mod event;
pub mod ics;
pub mod patch;
pub mod remote;
pub mod session;

pub use error::{CalError, CalResult};
