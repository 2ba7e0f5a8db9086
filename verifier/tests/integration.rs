//! Integration tests: enrollment and challenge sessions through an in-process verifier.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use pentagon_proto::wire::{self, error_codes};
use pentagon_proto::{answer_for, AuthRound, Direction, Keypair, Legend};
use pentagon_verifier::challenge::{INCORRECT_MESSAGE, VERIFIED_MESSAGE};
use pentagon_verifier::config::VerifierConfig;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const SALT: &str = "test-salt";

struct Client {
    sink: WsSink,
    stream: WsStream,
}

impl Client {
    async fn connect(url: &str) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let (sink, stream) = ws.split();
        Self { sink, stream }
    }

    async fn send(&mut self, msg: &wire::Message) {
        self.sink
            .send(Message::Text(msg.to_json().unwrap()))
            .await
            .unwrap();
    }

    async fn request(&mut self, msg: &wire::Message) -> wire::Message {
        self.send(msg).await;
        wire::Message::from_json(&read_text(&mut self.stream).await).unwrap()
    }

    async fn enroll(&mut self, password: &str, legend: &str, keypair: &Keypair) -> wire::Message {
        self.request(&wire::Message::NewCoinAuth {
            version: wire::PROTOCOL_VERSION,
            password: password.into(),
            legend: legend.into(),
            private_key: keypair.private_key_hex().to_string(),
            salt: SALT.into(),
        })
        .await
    }

    async fn begin(&mut self, address: &str, salt: &str) -> wire::Message {
        self.request(&wire::Message::CoinAuth {
            version: wire::PROTOCOL_VERSION,
            address: address.into(),
            salt: salt.into(),
        })
        .await
    }

    async fn solve(&mut self, answer: Direction) -> wire::Message {
        self.request(&wire::Message::SolveCurrentRound {
            answer: answer.to_wire().to_string(),
        })
        .await
    }
}

async fn read_text(stream: &mut WsStream) -> String {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(t))) => return t.to_string(),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) => panic!("connection closed unexpectedly"),
            Some(Ok(other)) => panic!("expected text, got: {other:?}"),
            Some(Err(e)) => panic!("ws error: {e}"),
            None => panic!("stream ended"),
        }
    }
}

/// Read text, returning None if the connection was closed.
async fn try_read_text(stream: &mut WsStream) -> Option<String> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(t))) => return Some(t.to_string()),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => return None,
        }
    }
}

async fn start(config: VerifierConfig) -> String {
    let (addr, _handle) = pentagon_verifier::server::run_test(config).await.unwrap();
    format!("ws://{addr}")
}

fn expect_error(msg: wire::Message, expected: &str) -> Option<String> {
    match msg {
        wire::Message::Error { code, message } => {
            assert_eq!(code, expected);
            message
        }
        other => panic!("expected error {expected}, got: {}", other.kind()),
    }
}

fn expect_round(msg: wire::Message) -> AuthRound {
    match msg {
        wire::Message::AuthState { auth_state } => auth_state,
        wire::Message::CurrentRound { round: Some(round) } => round,
        other => panic!("expected a round, got: {}", other.kind()),
    }
}

async fn enrolled_client(url: &str, password: &str, legend: &str) -> (Client, String) {
    let mut client = Client::connect(url).await;
    let keypair = Keypair::generate();
    match client.enroll(password, legend, &keypair).await {
        wire::Message::Enrolled { success, address } => {
            assert!(success);
            assert_eq!(address, keypair.address());
            (client, address)
        }
        other => panic!("expected enrolled, got: {}", other.kind()),
    }
}

/// Answer every round, corrupting the answer at `wrong_at` if given.
/// Returns the terminal `(verified, message)`.
async fn run_session(
    client: &mut Client,
    address: &str,
    secret: &str,
    legend: &Legend,
    wrong_at: Option<usize>,
) -> (bool, String) {
    let mut round = expect_round(client.begin(address, SALT).await);
    assert_eq!(round.current_round, 0);
    assert_eq!(round.color_assignment.round, 1);

    for (i, c) in secret.chars().enumerate() {
        round.color_assignment.validate().unwrap();
        let mut answer = answer_for(&round.color_assignment, c, legend).unwrap();
        if wrong_at == Some(i) {
            answer = Direction::ALL.into_iter().find(|d| *d != answer).unwrap();
        }

        match client.solve(answer).await {
            wire::Message::RoundSolution {
                verification_response: None,
            } => {
                let next = expect_round(client.request(&wire::Message::GetCurrentRound).await);
                assert_eq!(next.current_round, round.current_round + 1);
                assert_eq!(next.color_assignment.round, round.color_assignment.round + 1);
                assert_eq!(
                    next.prover_state.root_commitment,
                    round.prover_state.root_commitment
                );
                round = next;
            }
            wire::Message::RoundSolution {
                verification_response: Some(envelope),
            } => {
                assert_eq!(i + 1, secret.len(), "terminal result before the last round");
                return (
                    envelope.verification_result.verification_result,
                    envelope.message.unwrap_or_default(),
                );
            }
            other => panic!("expected round_solution, got: {}", other.kind()),
        }
    }
    panic!("session never reached a terminal result");
}

// ── Tests ──

#[tokio::test]
async fn enroll_and_verify_full_sequence() {
    let url = start(VerifierConfig::ephemeral()).await;
    let (mut client, address) = enrolled_client(&url, "COINFI", "URDL").await;
    let legend = Legend::parse("urdl").unwrap();

    let (verified, message) = run_session(&mut client, &address, "COINFI", &legend, None).await;
    assert!(verified);
    assert_eq!(message, VERIFIED_MESSAGE);

    // Session is over: no further rounds, no further answers
    match client.request(&wire::Message::GetCurrentRound).await {
        wire::Message::CurrentRound { round } => assert!(round.is_none()),
        other => panic!("expected current_round, got: {}", other.kind()),
    }
    expect_error(client.solve(Direction::Up).await, error_codes::NO_ACTIVE_SESSION);
}

#[tokio::test]
async fn one_wrong_answer_yields_incorrect_sequence() {
    let url = start(VerifierConfig::ephemeral()).await;
    let (mut client, address) = enrolled_client(&url, "AB#$", "LDRU").await;
    let legend = Legend::parse("ldru").unwrap();

    let (verified, message) = run_session(&mut client, &address, "AB#$", &legend, Some(1)).await;
    assert!(!verified);
    assert_eq!(message, INCORRECT_MESSAGE);
}

#[tokio::test]
async fn new_session_after_failure_can_verify() {
    let url = start(VerifierConfig::ephemeral()).await;
    let (mut client, address) = enrolled_client(&url, "1234", "DURL").await;
    let legend = Legend::parse("durl").unwrap();

    let (verified, _) = run_session(&mut client, &address, "1234", &legend, Some(3)).await;
    assert!(!verified);
    let (verified, _) = run_session(&mut client, &address, "1234", &legend, None).await;
    assert!(verified);
}

#[tokio::test]
async fn session_on_a_second_connection() {
    let url = start(VerifierConfig::ephemeral()).await;
    let (_enroller, address) = enrolled_client(&url, "ZZZZ9", "RLUD").await;

    let mut client = Client::connect(&url).await;
    let legend = Legend::parse("rlud").unwrap();
    let (verified, _) = run_session(&mut client, &address, "ZZZZ9", &legend, None).await;
    assert!(verified);
}

#[tokio::test]
async fn duplicate_enrollment_rejected() {
    let url = start(VerifierConfig::ephemeral()).await;
    let mut client = Client::connect(&url).await;
    let keypair = Keypair::generate();

    assert!(matches!(
        client.enroll("COINFI", "URDL", &keypair).await,
        wire::Message::Enrolled { .. }
    ));
    expect_error(
        client.enroll("COINFI", "URDL", &keypair).await,
        error_codes::ENROLLMENT_REJECTED,
    );
}

#[tokio::test]
async fn invalid_enrollment_input_reports_reason() {
    let url = start(VerifierConfig::ephemeral()).await;
    let mut client = Client::connect(&url).await;

    let message = expect_error(
        client.enroll("AB", "URDL", &Keypair::generate()).await,
        error_codes::ENROLLMENT_REJECTED,
    );
    assert_eq!(
        message.as_deref(),
        Some("Password must be at least 4 characters long")
    );

    expect_error(
        client.enroll("COINFI", "UUDL", &Keypair::generate()).await,
        error_codes::ENROLLMENT_REJECTED,
    );
}

#[tokio::test]
async fn unknown_identity_and_wrong_salt() {
    let url = start(VerifierConfig::ephemeral()).await;
    let (mut client, address) = enrolled_client(&url, "COINFI", "URDL").await;

    expect_error(
        client.begin(&Keypair::generate().address(), SALT).await,
        error_codes::UNKNOWN_IDENTITY,
    );
    expect_error(client.begin(&address, "not-the-salt").await, error_codes::UNKNOWN_IDENTITY);
}

#[tokio::test]
async fn solve_without_session() {
    let url = start(VerifierConfig::ephemeral()).await;
    let mut client = Client::connect(&url).await;

    expect_error(client.solve(Direction::Left).await, error_codes::NO_ACTIVE_SESSION);
    match client.request(&wire::Message::GetCurrentRound).await {
        wire::Message::CurrentRound { round } => assert!(round.is_none()),
        other => panic!("expected current_round, got: {}", other.kind()),
    }
}

#[tokio::test]
async fn invalid_answer_keeps_session() {
    let url = start(VerifierConfig::ephemeral()).await;
    let (mut client, address) = enrolled_client(&url, "COINFI", "URDL").await;
    let round = expect_round(client.begin(&address, SALT).await);

    let reply = client
        .request(&wire::Message::SolveCurrentRound {
            answer: "X".into(),
        })
        .await;
    expect_error(reply, error_codes::INVALID_ANSWER);

    let again = expect_round(client.request(&wire::Message::GetCurrentRound).await);
    assert_eq!(again, round);
}

#[tokio::test]
async fn expired_session_rejected() {
    let mut config = VerifierConfig::ephemeral();
    config.session_expiry = Duration::ZERO;
    let url = start(config).await;
    let (mut client, address) = enrolled_client(&url, "COINFI", "URDL").await;

    expect_round(client.begin(&address, SALT).await);
    expect_error(client.solve(Direction::Up).await, error_codes::SESSION_EXPIRED);
    expect_error(client.solve(Direction::Up).await, error_codes::NO_ACTIVE_SESSION);
}

#[tokio::test]
async fn unsupported_version_closes_connection() {
    let url = start(VerifierConfig::ephemeral()).await;
    let mut client = Client::connect(&url).await;

    let reply = client
        .request(&wire::Message::CoinAuth {
            version: 99,
            address: Keypair::generate().address(),
            salt: SALT.into(),
        })
        .await;
    expect_error(reply, error_codes::UNSUPPORTED_VERSION);
    assert!(try_read_text(&mut client.stream).await.is_none());
}

#[tokio::test]
async fn malformed_json_closes_connection() {
    let url = start(VerifierConfig::ephemeral()).await;
    let mut client = Client::connect(&url).await;

    client
        .sink
        .send(Message::Text("{not json".into()))
        .await
        .unwrap();
    let reply = wire::Message::from_json(&read_text(&mut client.stream).await).unwrap();
    expect_error(reply, error_codes::MALFORMED_REQUEST);
    assert!(try_read_text(&mut client.stream).await.is_none());
}

#[tokio::test]
async fn rate_limit_enforced() {
    let mut config = VerifierConfig::ephemeral();
    config.rate_limit_auth = 2;
    let url = start(config).await;

    let mut client = Client::connect(&url).await;
    for _ in 0..2 {
        expect_error(
            client.begin(&Keypair::generate().address(), SALT).await,
            error_codes::UNKNOWN_IDENTITY,
        );
    }
    expect_error(
        client.begin(&Keypair::generate().address(), SALT).await,
        error_codes::RATE_LIMITED,
    );
}
