//! WebSocket adapter speaking the verifier's JSON protocol.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use zeroize::Zeroize;

use pentagon_proto::wire;
use pentagon_proto::{AuthRound, RoundSolution};

use crate::backend::{AuthBackend, BackendError, EnrollAck, EnrollRequest};
use crate::ceremony::{Ceremony, CeremonyKind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`AuthBackend`] over one lazily opened WebSocket connection.
///
/// A session lives on the connection it was started on, so the connection is
/// kept open across calls until [`WsBackend::close`] or a transport error.
pub struct WsBackend {
    url: String,
    address: Option<String>,
    ceremony: Box<dyn Ceremony>,
    conn: Option<WsStream>,
}

impl WsBackend {
    pub fn new(url: impl Into<String>, ceremony: Box<dyn Ceremony>) -> Self {
        Self {
            url: url.into(),
            address: None,
            ceremony,
            conn: None,
        }
    }

    /// Identity that `coin_auth` starts sessions for.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Close the connection, ending any open session.
    pub async fn close(&mut self) {
        if let Some(mut ws) = self.conn.take() {
            let _ = ws.close(None).await;
        }
    }

    async fn connection(&mut self) -> Result<&mut WsStream, BackendError> {
        if self.conn.is_none() {
            debug!(url = %self.url, "connecting to verifier");
            let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
                .await
                .map_err(|e| BackendError::Transport(format!("failed to connect to {}: {e}", self.url)))?;
            self.conn = Some(ws);
        }
        self.conn
            .as_mut()
            .ok_or_else(|| BackendError::Transport("not connected".into()))
    }

    /// Send one request and read its reply. Error replies become
    /// [`BackendError::Rejected`]; a broken connection is dropped.
    async fn request(&mut self, msg: &wire::Message) -> Result<wire::Message, BackendError> {
        let result = self.exchange(msg).await;
        if let Err(BackendError::Transport(_)) = &result {
            self.conn = None;
        }

        match result? {
            wire::Message::Error { code, message } => {
                debug!(%code, "verifier rejected {}", msg.kind());
                Err(BackendError::Rejected(message.unwrap_or(code)))
            }
            reply => Ok(reply),
        }
    }

    async fn exchange(&mut self, msg: &wire::Message) -> Result<wire::Message, BackendError> {
        let json = msg
            .to_json()
            .map_err(|e| BackendError::Transport(format!("failed to encode request: {e}")))?;
        let ws = self.connection().await?;
        ws.send(Message::Text(json))
            .await
            .map_err(|e| BackendError::Transport(format!("send failed: {e}")))?;

        let text = read_text_message(ws).await?;
        wire::Message::from_json(&text)
            .map_err(|e| BackendError::UnexpectedResponse(format!("undecodable reply: {e}")))
    }
}

#[async_trait]
impl AuthBackend for WsBackend {
    async fn new_coin_auth(&mut self, request: EnrollRequest) -> Result<EnrollAck, BackendError> {
        self.ceremony.confirm(CeremonyKind::Enrollment)?;

        let msg = wire::Message::NewCoinAuth {
            version: wire::PROTOCOL_VERSION,
            password: request.password.to_string(),
            legend: request.legend,
            private_key: request.private_key.to_string(),
            salt: request.salt,
        };
        let reply = self.request(&msg).await;
        if let wire::Message::NewCoinAuth {
            mut password,
            mut private_key,
            ..
        } = msg
        {
            password.zeroize();
            private_key.zeroize();
        }

        match reply? {
            wire::Message::Enrolled { success, address } => {
                if success {
                    self.address = Some(address.clone());
                }
                Ok(EnrollAck {
                    success,
                    address: Some(address),
                    error: None,
                })
            }
            other => Err(unexpected(&other)),
        }
    }

    async fn coin_auth(&mut self, salt: &str) -> Result<AuthRound, BackendError> {
        let address = self
            .address
            .clone()
            .ok_or_else(|| BackendError::Rejected("no enrolled identity".into()))?;

        self.ceremony.confirm(CeremonyKind::Authentication)?;

        let msg = wire::Message::CoinAuth {
            version: wire::PROTOCOL_VERSION,
            address,
            salt: salt.to_string(),
        };
        match self.request(&msg).await? {
            wire::Message::AuthState { auth_state } => Ok(auth_state),
            other => Err(unexpected(&other)),
        }
    }

    async fn solve_current_round(&mut self, answer: &str) -> Result<RoundSolution, BackendError> {
        let msg = wire::Message::SolveCurrentRound {
            answer: answer.to_string(),
        };
        match self.request(&msg).await? {
            wire::Message::RoundSolution {
                verification_response,
            } => Ok(RoundSolution {
                verification_response,
            }),
            other => Err(unexpected(&other)),
        }
    }

    async fn get_current_round(&mut self) -> Result<Option<AuthRound>, BackendError> {
        match self.request(&wire::Message::GetCurrentRound).await? {
            wire::Message::CurrentRound { round } => Ok(round),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(reply: &wire::Message) -> BackendError {
    BackendError::UnexpectedResponse(format!("unexpected {} reply", reply.kind()))
}

async fn read_text_message<R>(stream: &mut R) -> Result<String, BackendError>
where
    R: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => {
                return Err(BackendError::Transport("connection closed".into()))
            }
            Some(Ok(other)) => {
                return Err(BackendError::UnexpectedResponse(format!(
                    "expected text message, got: {other:?}"
                )))
            }
            Some(Err(e)) => return Err(BackendError::Transport(format!("WebSocket error: {e}"))),
        }
    }
}
