//! WebSocket server: accept loop and connection spawning.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};

use crate::config::VerifierConfig;
use crate::connection;
use crate::state::{SharedState, VerifierState};

/// Start the verifier and serve until the listener fails.
pub async fn run(config: VerifierConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state: SharedState = Arc::new(VerifierState::new(config.clone()));

    // Spawn background cleanup
    tokio::spawn(crate::cleanup::run_cleanup_loop(state.clone()));

    let listener = TcpListener::bind(&config.bind).await?;
    info!("pentagon-verifier listening on {}", listener.local_addr()?);

    let tls_acceptor = match (&config.tls_cert, &config.tls_key) {
        (Some(cert_path), Some(key_path)) => {
            let certs = load_certs(cert_path)?;
            let key = load_key(key_path)?;

            let server_config = rustls::ServerConfig::builder()
                .with_no_client_auth()
                .with_single_cert(certs, key)?;

            Some(tokio_rustls::TlsAcceptor::from(Arc::new(server_config)))
        }
        _ => {
            warn!("running without TLS (test mode only)");
            None
        }
    };

    loop {
        let (tcp_stream, peer_addr) = listener.accept().await?;

        let state = state.clone();
        let tls_acceptor = tls_acceptor.clone();

        tokio::spawn(async move {
            match tls_acceptor {
                Some(tls_acceptor) => match tls_acceptor.accept(tcp_stream).await {
                    Ok(tls_stream) => match accept_async(tls_stream).await {
                        Ok(ws) => connection::handle_connection(ws, peer_addr, state).await,
                        Err(e) => debug!("WebSocket handshake failed from {peer_addr}: {e}"),
                    },
                    Err(e) => debug!("TLS handshake failed from {peer_addr}: {e}"),
                },
                None => serve_plain(tcp_stream, peer_addr, state).await,
            }
        });
    }
}

/// Start the verifier on a random local port for testing. Returns the bound
/// address and the accept-loop task; abort the task to stop the server.
pub async fn run_test(
    config: VerifierConfig,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), Box<dyn std::error::Error>> {
    let state: SharedState = Arc::new(VerifierState::new(config));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        while let Ok((tcp_stream, peer_addr)) = listener.accept().await {
            tokio::spawn(serve_plain(tcp_stream, peer_addr, state.clone()));
        }
    });

    Ok((addr, handle))
}

async fn serve_plain(tcp_stream: TcpStream, peer_addr: SocketAddr, state: SharedState) {
    match accept_async(tcp_stream).await {
        Ok(ws) => connection::handle_connection(ws, peer_addr, state).await,
        Err(e) => debug!("WebSocket handshake failed from {peer_addr}: {e}"),
    }
}

fn load_certs(
    path: &std::path::Path,
) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>, Box<dyn std::error::Error>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    Ok(certs)
}

fn load_key(
    path: &std::path::Path,
) -> Result<rustls::pki_types::PrivateKeyDer<'static>, Box<dyn std::error::Error>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let key = rustls_pemfile::private_key(&mut reader)?.ok_or("no private key found in file")?;
    Ok(key)
}
