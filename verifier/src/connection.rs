//! Per-connection state machine: handles the full lifecycle of a single WebSocket connection.

use std::net::SocketAddr;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use pentagon_proto::wire::{self, error_codes};
use pentagon_proto::{Direction, Keypair, Legend, Secret};

use crate::challenge::ChallengeSession;
use crate::ratelimit;
use crate::registry::RegistryError;
use crate::state::{ConnId, SessionEntry, SharedState};

type WsSender = mpsc::UnboundedSender<Message>;

/// Where a connection is in the protocol.
enum ConnState {
    /// No session open. Enrollment and `coin_auth` are accepted.
    AwaitingRequest,
    /// A session is open and answers are accepted.
    Authenticating(Box<ChallengeSession>),
}

/// What to do with the connection after a message is handled.
enum Flow {
    Continue,
    Close,
}

pub async fn handle_connection(
    ws_stream: tokio_tungstenite::WebSocketStream<
        impl tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    >,
    peer_addr: SocketAddr,
    state: SharedState,
) {
    let (mut ws_sink, mut ws_stream_rx) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let conn_id = state.next_conn_id();
    debug!(conn_id, peer = %peer_addr, "connection opened");

    // Forward outbound messages
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut conn_state = ConnState::AwaitingRequest;

    while let Some(Ok(msg)) = ws_stream_rx.next().await {
        let flow = match msg {
            Message::Text(text) => match wire::Message::from_json(&text) {
                Ok(parsed) => {
                    debug!(conn_id, kind = parsed.kind(), "request");
                    handle_message(parsed, &mut conn_state, conn_id, peer_addr, &state, &tx)
                }
                Err(_) => {
                    send_error(&tx, error_codes::MALFORMED_REQUEST, "invalid message format");
                    Flow::Close
                }
            },
            Message::Binary(_) => {
                send_error(&tx, error_codes::MALFORMED_REQUEST, "binary frames are not accepted");
                Flow::Close
            }
            Message::Close(_) => Flow::Close,
            _ => Flow::Continue,
        };

        if let Flow::Close = flow {
            break;
        }
    }

    state.sessions.remove(&conn_id);
    debug!(conn_id, "connection closed");

    // Let queued replies flush before the writer goes away
    drop(tx);
    let _ = send_task.await;
}

fn handle_message(
    msg: wire::Message,
    conn_state: &mut ConnState,
    conn_id: ConnId,
    peer_addr: SocketAddr,
    state: &SharedState,
    tx: &WsSender,
) -> Flow {
    match msg {
        // ── Enrollment ──
        wire::Message::NewCoinAuth {
            version,
            password,
            legend,
            private_key,
            salt,
        } => {
            let password = zeroize::Zeroizing::new(password);
            let private_key = zeroize::Zeroizing::new(private_key);

            if version != wire::PROTOCOL_VERSION {
                send_error(tx, error_codes::UNSUPPORTED_VERSION, "unsupported protocol version");
                return Flow::Close;
            }
            if !ratelimit::check_and_record(state, peer_addr) {
                send_error(tx, error_codes::RATE_LIMITED, "too many attempts");
                return Flow::Close;
            }

            let secret = match Secret::parse(&password) {
                Ok(s) => s,
                Err(e) => {
                    send_error(tx, error_codes::ENROLLMENT_REJECTED, e.to_string());
                    return Flow::Continue;
                }
            };
            let legend = match Legend::parse(&legend) {
                Ok(l) => l,
                Err(e) => {
                    send_error(tx, error_codes::ENROLLMENT_REJECTED, e.to_string());
                    return Flow::Continue;
                }
            };
            let keypair = match Keypair::from_private_key_hex(&private_key) {
                Ok(k) => k,
                Err(_) => {
                    send_error(tx, error_codes::ENROLLMENT_REJECTED, "invalid private key");
                    return Flow::Continue;
                }
            };

            match state.registry.enroll(&secret, &legend, &keypair, &salt) {
                Ok(address) => {
                    info!(conn_id, %address, enrolled = state.registry.len(), "identity enrolled");
                    send(tx, &wire::Message::Enrolled {
                        success: true,
                        address,
                    });
                }
                Err(e @ RegistryError::AlreadyEnrolled(_)) => {
                    send_error(tx, error_codes::ENROLLMENT_REJECTED, e.to_string());
                }
                Err(e) => {
                    warn!(conn_id, "enrollment failed: {e}");
                    send_error(tx, error_codes::INTERNAL_ERROR, "enrollment failed");
                }
            }
            Flow::Continue
        }

        // ── Session start ──
        wire::Message::CoinAuth {
            version,
            address,
            salt,
        } => {
            if version != wire::PROTOCOL_VERSION {
                send_error(tx, error_codes::UNSUPPORTED_VERSION, "unsupported protocol version");
                return Flow::Close;
            }
            if !ratelimit::check_and_record(state, peer_addr) {
                send_error(tx, error_codes::RATE_LIMITED, "too many attempts");
                return Flow::Close;
            }

            let credential = match state.registry.open(&address, &salt) {
                Ok(c) => c,
                Err(RegistryError::UnknownIdentity(_)) | Err(RegistryError::Unseal(_)) => {
                    send_error(tx, error_codes::UNKNOWN_IDENTITY, "identity is not enrolled");
                    return Flow::Continue;
                }
                Err(e) => {
                    warn!(conn_id, %address, "credential unusable: {e}");
                    send_error(tx, error_codes::INTERNAL_ERROR, "credential unusable");
                    return Flow::Continue;
                }
            };

            // A new session replaces any open one
            let session = ChallengeSession::start(credential);
            state.sessions.insert(
                conn_id,
                SessionEntry {
                    expires_at: Instant::now() + state.config.session_expiry,
                    peer_addr,
                    address: address.clone(),
                },
            );
            info!(conn_id, %address, rounds = session.total_rounds(), "session started");

            if let Some(round) = session.current_round() {
                send(tx, &wire::Message::AuthState {
                    auth_state: round.clone(),
                });
            }
            *conn_state = ConnState::Authenticating(Box::new(session));
            Flow::Continue
        }

        // ── Answer ──
        wire::Message::SolveCurrentRound { answer } => {
            let ConnState::Authenticating(session) = conn_state else {
                send_error(tx, error_codes::NO_ACTIVE_SESSION, "no session in progress");
                return Flow::Continue;
            };
            if !state.session_alive(conn_id) {
                state.sessions.remove(&conn_id);
                *conn_state = ConnState::AwaitingRequest;
                send_error(tx, error_codes::SESSION_EXPIRED, "session expired");
                return Flow::Continue;
            }

            let direction = match parse_answer(&answer) {
                Some(d) => d,
                None => {
                    send_error(tx, error_codes::INVALID_ANSWER, "answer must be one of U, D, L, R");
                    return Flow::Continue;
                }
            };

            let solution = session.solve(direction);
            if session.is_finished() {
                let verified = solution
                    .verification_response
                    .as_ref()
                    .is_some_and(|r| r.verification_result.verification_result);
                info!(conn_id, verified, "session finished");
                state.sessions.remove(&conn_id);
                *conn_state = ConnState::AwaitingRequest;
            }
            send(tx, &wire::Message::round_solution(solution));
            Flow::Continue
        }

        // ── Next round ──
        wire::Message::GetCurrentRound => {
            let round = match conn_state {
                ConnState::Authenticating(session) if state.session_alive(conn_id) => {
                    session.current_round().cloned()
                }
                _ => None,
            };
            send(tx, &wire::Message::CurrentRound { round });
            Flow::Continue
        }

        other => {
            send_error(
                tx,
                error_codes::MALFORMED_REQUEST,
                format!("unexpected message: {}", other.kind()),
            );
            Flow::Close
        }
    }
}

/// Answers arrive as one upper-case direction letter.
fn parse_answer(answer: &str) -> Option<Direction> {
    let mut chars = answer.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Direction::from_code(c),
        _ => None,
    }
}

fn send(tx: &WsSender, msg: &wire::Message) {
    match msg.to_json() {
        Ok(json) => {
            let _ = tx.send(Message::Text(json));
        }
        Err(e) => warn!("failed to encode {}: {e}", msg.kind()),
    }
}

fn send_error(tx: &WsSender, code: &str, message: impl Into<String>) {
    send(tx, &wire::Message::error(code, message));
}
