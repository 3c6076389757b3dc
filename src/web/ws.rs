use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code};
use axum::response::Response;
use serde::Deserialize;

use crate::event::LogEvent;
use crate::observer::{ObserverHandle, ObserverToken};
use crate::process::Supervisor;
use crate::web::state::AppState;

/// Inbound console message
#[derive(Debug, Deserialize)]
struct CommandMessage {
    command: String,
}

/// Extract the command from an inbound JSON message
fn parse_command(raw: &str) -> Result<String, serde_json::Error> {
    serde_json::from_str::<CommandMessage>(raw).map(|message| message.command)
}

/// What the socket loop does with one inbound frame
#[derive(Debug, PartialEq, Eq)]
enum Inbound<'a> {
    Command(&'a str),
    Close,
    Skip,
}

fn inbound(message: &Message) -> Inbound<'_> {
    match message {
        Message::Text(text) => Inbound::Command(text.as_str()),
        Message::Close(_) => Inbound::Close,
        Message::Binary(data) => {
            tracing::warn!(bytes = data.len(), "ignoring binary console message");
            Inbound::Skip
        }
        Message::Ping(_) | Message::Pong(_) => Inbound::Skip,
    }
}

/// Upgrade to the console WebSocket, which becomes the current observer
pub async fn console_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.supervisor))
}

/// Forward server events to the socket and socket commands to the server
///
/// The loop ends when the peer disconnects or when a newer connection
/// takes the observer slot, in which case a close frame is sent first.
async fn handle_socket(mut socket: WebSocket, supervisor: Supervisor) {
    let ObserverHandle { token, mut events } = supervisor.attach_observer();
    tracing::info!("console observer connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to encode console event");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    let frame = CloseFrame {
                        code: close_code::NORMAL,
                        reason: Utf8Bytes::from_static("replaced by newer connection"),
                    };
                    let _ = socket.send(Message::Close(Some(frame))).await;
                    break;
                }
            },
            message = socket.recv() => match message {
                Some(Ok(message)) => match inbound(&message) {
                    Inbound::Command(raw) => handle_command(&supervisor, token, raw).await,
                    Inbound::Close => break,
                    Inbound::Skip => {}
                },
                None => break,
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "console socket read failed");
                    break;
                }
            },
        }
    }

    supervisor.detach_observer(token);
    tracing::info!("console observer disconnected");
}

async fn handle_command(supervisor: &Supervisor, token: ObserverToken, raw: &str) {
    let command = match parse_command(raw) {
        Ok(command) => command,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring malformed console message");
            return;
        }
    };
    if let Err(err) = supervisor.send_command(&command).await {
        supervisor.observers().emit_to(
            token,
            LogEvent::Error {
                text: format!("Error: {err}"),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{LaunchSpec, SupervisorOptions};

    #[test]
    fn parse_command_reads_command_field() {
        let command = parse_command(r#"{"command":"say hello","HEADERS":{"HX-Trigger":"form"}}"#);
        assert_eq!(command.unwrap(), "say hello");
    }

    #[test]
    fn parse_command_rejects_malformed_payloads() {
        assert!(parse_command("say hello").is_err());
        assert!(parse_command(r#"{"cmd":"list"}"#).is_err());
        assert!(parse_command(r#"{"command":42}"#).is_err());
    }

    #[test]
    fn inbound_skips_non_text_frames() {
        assert_eq!(
            inbound(&Message::Text(r#"{"command":"list"}"#.into())),
            Inbound::Command(r#"{"command":"list"}"#)
        );
        assert_eq!(inbound(&Message::Close(None)), Inbound::Close);
        assert_eq!(inbound(&Message::Binary(vec![1, 2, 3].into())), Inbound::Skip);
        assert_eq!(inbound(&Message::Ping(Vec::new().into())), Inbound::Skip);
        assert_eq!(inbound(&Message::Pong(Vec::new().into())), Inbound::Skip);
    }

    #[tokio::test]
    async fn handle_command_reports_failure_to_sender_only() {
        let spec = LaunchSpec {
            program: "sh".into(),
            args: vec!["-c".into(), "exit 0".into()],
            working_dir: std::env::temp_dir(),
        };
        let supervisor = Supervisor::new(spec, SupervisorOptions::default());
        let mut handle = supervisor.attach_observer();

        handle_command(&supervisor, handle.token, r#"{"command":"list"}"#).await;
        handle_command(&supervisor, handle.token, "not json").await;

        assert_eq!(
            handle.events.try_recv().unwrap(),
            LogEvent::Error {
                text: "Error: server not running".into()
            }
        );
        assert!(handle.events.try_recv().is_err());
    }
}
