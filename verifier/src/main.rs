use clap::Parser;
use pentagon_verifier::config::{VerifierArgs, VerifierConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = VerifierArgs::parse();
    let config = match VerifierConfig::try_from(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    if let Err(e) = pentagon_verifier::server::run(config).await {
        tracing::error!("verifier error: {e}");
        std::process::exit(1);
    }
}
