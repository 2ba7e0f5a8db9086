pub mod auth;
pub mod config;
pub mod enroll;
pub mod reset;
pub mod status;

use anyhow::Result;

use pentagon_cli::storage::{self, Config};
use pentagon_cli::{AutoApprove, Ceremony, PromptCeremony};

/// The verifier URL to use: the command-line override, else the configured one.
fn verifier_url(config: &Config, verifier: Option<String>) -> Result<String> {
    let url = verifier.unwrap_or_else(|| config.verifier.clone());
    if !storage::is_ws_url(&url) {
        anyhow::bail!("invalid verifier URL {url:?}: must start with ws:// or wss://");
    }
    Ok(url)
}

fn ceremony(yes: bool) -> Box<dyn Ceremony> {
    if yes {
        Box::new(AutoApprove)
    } else {
        Box::new(PromptCeremony)
    }
}

fn interactive() -> bool {
    atty::is(atty::Stream::Stdin)
}
