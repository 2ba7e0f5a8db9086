//! `pentagon auth`: run one authentication session.

use anyhow::{Context, Result};

use pentagon_cli::render::{prompt_direction, render_round};
use pentagon_cli::storage::Storage;
use pentagon_cli::{AuthError, RoundEngine, Step, WsBackend};
use pentagon_proto::{answer_for, AuthRound, Direction, Legend, Secret};

pub struct AuthOptions {
    /// With `legend`, answers every round without prompting.
    pub secret: Option<String>,
    pub legend: Option<String>,
    pub yes: bool,
    pub verifier: Option<String>,
}

/// Where each round's answer comes from.
enum Answers {
    Prompt,
    Derived { secret: Secret, legend: Legend },
}

impl Answers {
    fn next(&self, round: &AuthRound) -> Result<Direction> {
        match self {
            Answers::Prompt => {
                eprint!("{}", render_round(round));
                prompt_direction()
            }
            Answers::Derived { secret, legend } => {
                let c = secret
                    .char_at(round.current_round as usize)
                    .context("the verifier asked for more rounds than the secret has characters")?;
                answer_for(&round.color_assignment, c, legend)
                    .context("a secret character has no color in this round")
            }
        }
    }
}

pub async fn run(opts: AuthOptions) -> Result<()> {
    let storage = Storage::open()?;
    let config = storage.load_config()?;
    let identity = if config.salt.is_empty() {
        None
    } else {
        storage.load_credential(&config.salt)?
    };
    let identity = identity.context("not enrolled; run `pentagon enroll` first")?;
    let url = super::verifier_url(&config, opts.verifier)?;

    let answers = match (opts.secret, opts.legend) {
        (Some(secret), Some(legend)) => Answers::Derived {
            secret: Secret::parse(&secret)?,
            legend: Legend::parse(&legend).context("invalid --legend")?,
        },
        (None, None) => {
            if !super::interactive() {
                anyhow::bail!("no terminal to prompt on; pass --secret and --legend");
            }
            Answers::Prompt
        }
        _ => anyhow::bail!("--secret and --legend must be given together"),
    };

    let backend = WsBackend::new(url, super::ceremony(opts.yes)).with_address(identity.address);
    eprintln!(
        "Authenticating {} with {}...",
        backend.address().unwrap_or_default(),
        backend.url()
    );
    let mut engine = RoundEngine::new(backend);

    let outcome = drive(&mut engine, &config.salt, &answers).await;
    engine.backend_mut().close().await;

    println!("{}", finish(outcome)?);
    Ok(())
}

/// Only a verified session succeeds; cancellation is an error like any other.
fn finish(outcome: Result<String, AuthError>) -> Result<String> {
    match outcome {
        Ok(message) => Ok(message),
        Err(e @ AuthError::Cancelled) => Err(e).context("authentication was not completed"),
        Err(e) => Err(e.into()),
    }
}

async fn drive(
    engine: &mut RoundEngine<WsBackend>,
    salt: &str,
    answers: &Answers,
) -> Result<String, AuthError> {
    let mut round = engine.begin_authentication(salt).await?;
    loop {
        let direction = match answers.next(&round) {
            Ok(d) => d,
            Err(e) => {
                engine.reset_auth_state();
                return Err(AuthError::Failed(format!("{e:#}")));
            }
        };
        match engine.submit_answer(direction).await? {
            Step::NextRound(next) => round = next,
            Step::Verified(response) => return Ok(response.message),
        }
    }
}
