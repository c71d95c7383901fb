//! Session core of a browser IDE client.
//!
//! The editing side ([`session::IdeSession`]) tracks open tabs, edit buffers
//! and explicit saves against a REST file store. The terminal side
//! ([`terminal::TerminalSessionClient`]) is a connection state machine for the
//! project's backend shell. The two are composed by the caller, never coupled.

pub mod api;
pub mod config;
pub mod content_sync;
pub mod error;
pub mod model;
pub mod path_resolver;
pub mod session;
pub mod store;
pub mod tabs;
pub mod terminal;
pub mod upload;
