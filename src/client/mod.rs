//! Typed client-side state used by the web frontends.

pub mod booking;
pub mod session;
