use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::SessionStateError;
use crate::model::ProjectId;
use crate::terminal::history::CommandHistory;
use crate::terminal::protocol::{ClientMessage, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// `ready` flips once the backend shell acknowledges startup.
    Connected { ready: bool },
}

/// Which project shell to attach to, and as whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub project_id: ProjectId,
    pub user_id: String,
}

/// Inputs delivered to the client by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// The connect request was accepted.
    Accepted,
    Message(ServerMessage),
    ConnectFailed(String),
    /// The channel dropped without a `closed` message.
    TransportClosed,
}

/// Connection state machine for the single shell session of a project.
///
/// All mutation happens through the methods below, called from one event
/// loop. Outbound protocol messages go to `outbound`; the transport answers
/// with [`TerminalEvent`]s fed to [`TerminalSessionClient::handle_event`].
#[derive(Debug)]
pub struct TerminalSessionClient {
    state: ConnectionState,
    target: Option<SessionTarget>,
    /// A stop was sent and its acknowledgement has not arrived yet.
    stopping: bool,
    /// Start to issue once the pending teardown is acknowledged.
    restart_target: Option<SessionTarget>,
    output_log: Vec<String>,
    history: CommandHistory,
    outbound: mpsc::UnboundedSender<ClientMessage>,
}

impl TerminalSessionClient {
    pub fn new(outbound: mpsc::UnboundedSender<ClientMessage>, history: CommandHistory) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            target: None,
            stopping: false,
            restart_target: None,
            output_log: Vec::new(),
            history,
            outbound,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected { .. })
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Connected { ready: true } && !self.stopping
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    pub fn target(&self) -> Option<&SessionTarget> {
        self.target.as_ref()
    }

    pub fn output_log(&self) -> &[String] {
        &self.output_log
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn history_up(&mut self) -> Option<&str> {
        self.history.up()
    }

    pub fn history_down(&mut self) -> Option<&str> {
        self.history.down()
    }

    /// Request a new shell session. Only valid while fully disconnected; a
    /// start issued before a previous stop is acknowledged is rejected.
    pub fn start(&mut self, target: SessionTarget) -> Result<(), SessionStateError> {
        if self.stopping {
            warn!(project_id = %target.project_id, "Start rejected: teardown still pending");
            return Err(SessionStateError::TeardownPending);
        }
        if self.state != ConnectionState::Disconnected {
            warn!(project_id = %target.project_id, state = ?self.state, "Start rejected: session active");
            return Err(SessionStateError::AlreadyActive);
        }
        info!(project_id = %target.project_id, user_id = %target.user_id, "Starting terminal session");
        self.output_log.clear();
        self.history.reset_cursor();
        self.send(ClientMessage::Start {
            project_id: target.project_id.clone(),
            user_id: target.user_id.clone(),
        });
        self.target = Some(target);
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Submit a command line. Only valid once ready; otherwise nothing is
    /// sent and history is untouched.
    pub fn send_command(&mut self, text: &str) -> Result<(), SessionStateError> {
        if !self.is_ready() {
            debug!(state = ?self.state, "Dropping command, terminal not ready");
            return Err(SessionStateError::NotReady);
        }
        self.history.push(text.to_string());
        self.send(ClientMessage::Input {
            data: format!("{text}\n"),
        });
        Ok(())
    }

    /// Request teardown. The state becomes `Disconnected` when the backend
    /// acknowledges. Cancels any queued restart. Returns false when there was
    /// nothing to stop.
    pub fn stop(&mut self) -> bool {
        if self.restart_target.take().is_some() {
            debug!("Queued restart cancelled by stop");
        }
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        if !self.stopping {
            info!(state = ?self.state, "Stopping terminal session");
            self.stopping = true;
            self.send(ClientMessage::Stop);
        }
        true
    }

    /// "New terminal": stop the current session and start again once the
    /// teardown is acknowledged.
    pub fn restart(&mut self, target: SessionTarget) -> Result<(), SessionStateError> {
        if self.state == ConnectionState::Disconnected && !self.stopping {
            return self.start(target);
        }
        debug!(project_id = %target.project_id, "Restart queued behind teardown");
        self.stop();
        self.restart_target = Some(target);
        Ok(())
    }

    /// Clear the output log. Connection state is unaffected.
    pub fn clear(&mut self) {
        self.output_log.clear();
    }

    pub fn handle_event(&mut self, event: TerminalEvent) {
        match event {
            TerminalEvent::Accepted => {
                if self.state == ConnectionState::Connecting {
                    debug!("Terminal connect accepted");
                    self.state = ConnectionState::Connected { ready: false };
                } else {
                    debug!(state = ?self.state, "Ignoring stray accept");
                }
            }
            TerminalEvent::Message(ServerMessage::Ready) => match self.state {
                ConnectionState::Connecting | ConnectionState::Connected { ready: false } => {
                    info!("Terminal ready");
                    self.state = ConnectionState::Connected { ready: true };
                }
                _ => debug!(state = ?self.state, "Ignoring duplicate ready"),
            },
            TerminalEvent::Message(ServerMessage::Output { data }) => {
                if self.state == ConnectionState::Disconnected {
                    debug!("Output after session ended, ignoring");
                    return;
                }
                if self.state != (ConnectionState::Connected { ready: true }) {
                    warn!(state = ?self.state, "Backend sent output before ready");
                }
                self.output_log.extend(data.lines().map(str::to_string));
            }
            TerminalEvent::Message(ServerMessage::Closed) => {
                debug!("Backend closed terminal session");
                self.finish_teardown();
            }
            TerminalEvent::ConnectFailed(err) => {
                warn!(error = %err, "Terminal connect failed");
                self.output_log.push(format!("[connection failed: {err}]"));
                self.finish_teardown();
            }
            TerminalEvent::TransportClosed => {
                if self.state != ConnectionState::Disconnected {
                    warn!(state = ?self.state, "Terminal channel dropped");
                }
                self.finish_teardown();
            }
        }
    }

    fn finish_teardown(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.stopping = false;
        if let Some(target) = self.restart_target.take() {
            if let Err(err) = self.start(target) {
                warn!(error = %err, "Queued restart failed");
            }
        }
    }

    fn send(&self, msg: ClientMessage) {
        if self.outbound.send(msg).is_err() {
            warn!("Terminal transport is gone, message dropped");
        }
    }
}
