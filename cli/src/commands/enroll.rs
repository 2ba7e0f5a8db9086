//! `pentagon enroll`: create an identity and register it with the verifier.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Password, Select};

use pentagon_cli::enroll::enroll;
use pentagon_cli::storage::{Storage, StoredIdentity};
use pentagon_cli::{EnrollError, WsBackend};
use pentagon_proto::{Color, Direction, Keypair, Legend, Secret};

pub struct EnrollOptions {
    pub replace: bool,
    pub secret: Option<String>,
    pub legend: Option<String>,
    pub keys: Option<String>,
    pub show_private_key: bool,
    pub yes: bool,
    pub verifier: Option<String>,
}

pub async fn run(opts: EnrollOptions) -> Result<()> {
    let storage = Storage::open()?;
    let config = storage.load_or_init_config()?;
    let url = super::verifier_url(&config, opts.verifier)?;

    if storage.has_credential()? {
        if !opts.replace {
            anyhow::bail!(
                "an identity is already enrolled on this device.\n\
                 Pass --replace to enroll a new one in its place."
            );
        }
        if !opts.yes {
            confirm_replace()?;
        }
    }

    let secret = match opts.secret {
        Some(s) => Secret::parse(&s)?,
        None => prompt_secret()?,
    };
    let legend = match (opts.legend, opts.keys) {
        (Some(codes), _) => Legend::parse(&codes).context("invalid --legend")?,
        (None, Some(keys)) => Legend::from_keys(&keys).context("invalid --keys")?,
        (None, None) => prompt_legend()?,
    };

    eprintln!("Enrolling with {url}...");
    let mut backend = WsBackend::new(url, super::ceremony(opts.yes));
    let result = enroll(&mut backend, &secret, &legend, Keypair::generate(), &config.salt).await;
    backend.close().await;

    let result = match result {
        Ok(r) => r,
        Err(e @ EnrollError::Cancelled) => return Err(e).context("nothing was enrolled"),
        Err(e) => return Err(e).context("enrollment failed"),
    };

    storage.save_credential(
        &config.salt,
        &StoredIdentity {
            address: result.address.clone(),
            public_key: result.public_key.clone(),
        },
    )?;

    eprintln!("Enrolled.");
    println!("{}", result.address);
    if opts.show_private_key {
        eprintln!("Private key (not stored anywhere, keep it safe):");
        println!("{}", result.private_key.as_str());
    }
    Ok(())
}

fn confirm_replace() -> Result<()> {
    if !super::interactive() {
        anyhow::bail!("refusing to replace the enrolled identity without --yes");
    }
    let confirmed = Confirm::new()
        .with_prompt("Replace the identity enrolled on this device?")
        .default(false)
        .interact()?;
    if !confirmed {
        anyhow::bail!("aborted");
    }
    Ok(())
}

fn prompt_secret() -> Result<Secret> {
    if !super::interactive() {
        anyhow::bail!("no terminal to prompt on; pass --secret");
    }
    eprintln!("Choose a secret of 4-10 characters from A-Z, 0-9 and ! @ # $.");
    loop {
        let input = Password::new()
            .with_prompt("Secret")
            .with_confirmation("Repeat secret", "Secrets do not match")
            .interact()?;
        match Secret::parse(&input) {
            Ok(secret) => return Ok(secret),
            Err(e) => eprintln!("{e}"),
        }
    }
}

/// Ask for one direction per color; the last color gets the direction left over.
fn prompt_legend() -> Result<Legend> {
    if !super::interactive() {
        anyhow::bail!("no terminal to prompt on; pass --legend or --keys");
    }
    let mut remaining: Vec<Direction> = Direction::ALL.to_vec();
    let mut chosen = [Direction::Up; 4];

    for (slot, color) in chosen.iter_mut().zip(Color::ALL) {
        let index = if remaining.len() == 1 {
            0
        } else {
            let items: Vec<&str> = remaining.iter().map(|d| d.name()).collect();
            Select::new()
                .with_prompt(format!("Direction for {color}"))
                .items(&items)
                .default(0)
                .interact()?
        };
        *slot = remaining.remove(index);
    }

    Ok(Legend::new(chosen)?)
}
