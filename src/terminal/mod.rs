//! Terminal session client: protocol, history browsing, the connection state
//! machine and its websocket transport.

pub mod client;
pub mod history;
pub mod protocol;
pub mod transport;

pub use client::{ConnectionState, SessionTarget, TerminalEvent, TerminalSessionClient};
pub use history::CommandHistory;
pub use protocol::{ClientMessage, ServerMessage};
