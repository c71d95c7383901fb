use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::terminal::client::TerminalEvent;
use crate::terminal::protocol::{ClientMessage, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Spawn the websocket pump between a [`crate::terminal::TerminalSessionClient`]
/// and the backend.
///
/// A `start` message opens a connection; everything else is forwarded on the
/// open connection or dropped when there is none. The socket is closed after
/// the backend's `closed` message. The task ends when `outbound` is dropped.
pub fn spawn_transport(
    url: Url,
    outbound: mpsc::UnboundedReceiver<ClientMessage>,
    events: mpsc::UnboundedSender<TerminalEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_transport(url, outbound, events).await;
    })
}

async fn run_transport(
    url: Url,
    mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
    events: mpsc::UnboundedSender<TerminalEvent>,
) {
    while let Some(msg) = outbound.recv().await {
        if !matches!(msg, ClientMessage::Start { .. }) {
            debug!(?msg, "No terminal connection open, dropping message");
            continue;
        }

        debug!(%url, "Connecting terminal socket");
        let ws = match connect_async(url.as_str()).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                let _ = events.send(TerminalEvent::ConnectFailed(e.to_string()));
                continue;
            }
        };
        info!(%url, "Terminal socket connected");
        let _ = events.send(TerminalEvent::Accepted);

        match run_connection(ws, msg, &mut outbound, &events).await {
            Ok(ConnectionEnd::Closed) => debug!("Terminal session closed by backend"),
            Ok(ConnectionEnd::OwnerGone) => return,
            Ok(ConnectionEnd::Dropped) => {
                let _ = events.send(TerminalEvent::TransportClosed);
            }
            Err(e) => {
                warn!(error = %e, "Terminal socket error");
                let _ = events.send(TerminalEvent::TransportClosed);
            }
        }
    }
    debug!("Terminal transport shutting down");
}

enum ConnectionEnd {
    /// Backend acknowledged with `closed`.
    Closed,
    /// Socket ended without `closed`.
    Dropped,
    OwnerGone,
}

async fn run_connection(
    mut ws: WsStream,
    start: ClientMessage,
    outbound: &mut mpsc::UnboundedReceiver<ClientMessage>,
    events: &mpsc::UnboundedSender<TerminalEvent>,
) -> Result<ConnectionEnd> {
    send_json(&mut ws, &start).await?;

    loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(ClientMessage::Start { .. }) => {
                    warn!("Start received on an open terminal connection, ignoring");
                }
                Some(msg) => send_json(&mut ws, &msg).await?,
                None => {
                    let _ = ws.close(None).await;
                    return Ok(ConnectionEnd::OwnerGone);
                }
            },
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => match ServerMessage::from_json(text.as_str()) {
                    Ok(ServerMessage::Closed) => {
                        let _ = events.send(TerminalEvent::Message(ServerMessage::Closed));
                        let _ = ws.close(None).await;
                        return Ok(ConnectionEnd::Closed);
                    }
                    Ok(msg) => {
                        let _ = events.send(TerminalEvent::Message(msg));
                    }
                    Err(e) => debug!(error = %e, "Unparseable terminal frame"),
                },
                Some(Ok(Message::Close(_))) | None => return Ok(ConnectionEnd::Dropped),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Terminal socket read failed"),
            },
        }
    }
}

async fn send_json(ws: &mut WsStream, msg: &ClientMessage) -> Result<()> {
    let text = msg.to_json().context("Failed to encode terminal message")?;
    ws.send(Message::text(text))
        .await
        .context("Terminal socket write failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProjectId;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn next_client_message(ws: &mut WebSocketStream<TcpStream>) -> ClientMessage {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    async fn reply(ws: &mut WebSocketStream<TcpStream>, json: &str) {
        ws.send(Message::text(json.to_string())).await.unwrap();
    }

    #[tokio::test]
    async fn relays_a_full_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let backend = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let start = next_client_message(&mut ws).await;
            assert!(matches!(start, ClientMessage::Start { .. }));
            reply(&mut ws, r#"{"type":"ready"}"#).await;
            let input = next_client_message(&mut ws).await;
            assert_eq!(input, ClientMessage::Input { data: "ls\n".into() });
            reply(&mut ws, r#"{"type":"output","data":"a.txt\nb.txt"}"#).await;
            assert_eq!(next_client_message(&mut ws).await, ClientMessage::Stop);
            reply(&mut ws, r#"{"type":"closed"}"#).await;
        });

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();
        let url = Url::parse(&format!("ws://{addr}/terminal")).unwrap();
        let handle = spawn_transport(url, out_rx, ev_tx);

        out_tx
            .send(ClientMessage::Start {
                project_id: ProjectId::new("p1"),
                user_id: "u1".into(),
            })
            .unwrap();
        assert_eq!(ev_rx.recv().await, Some(TerminalEvent::Accepted));
        assert_eq!(
            ev_rx.recv().await,
            Some(TerminalEvent::Message(ServerMessage::Ready))
        );

        out_tx.send(ClientMessage::Input { data: "ls\n".into() }).unwrap();
        assert_eq!(
            ev_rx.recv().await,
            Some(TerminalEvent::Message(ServerMessage::Output {
                data: "a.txt\nb.txt".into()
            }))
        );

        out_tx.send(ClientMessage::Stop).unwrap();
        assert_eq!(
            ev_rx.recv().await,
            Some(TerminalEvent::Message(ServerMessage::Closed))
        );

        backend.await.unwrap();
        drop(out_tx);
        handle.await.unwrap();
        assert!(ev_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reports_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();
        let _handle = spawn_transport(Url::parse(&format!("ws://{addr}/")).unwrap(), out_rx, ev_tx);
        out_tx
            .send(ClientMessage::Start {
                project_id: ProjectId::new("p1"),
                user_id: "u1".into(),
            })
            .unwrap();
        assert!(matches!(ev_rx.recv().await, Some(TerminalEvent::ConnectFailed(_))));
    }
}
