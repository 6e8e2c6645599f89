//! Protocol vocabulary, decoded events, errors and settings.
//!
//! Nothing in this module talks to a transport.

pub mod error;
pub mod events;
pub mod settings;
pub mod types;
