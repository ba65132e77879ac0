//! The bridge boundary: wire protocol, subprocess channel, and the
//! session transport over it.

pub mod auth;
pub mod channel;
pub mod protocol;
pub mod transport;
