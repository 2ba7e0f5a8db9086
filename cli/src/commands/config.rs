//! `pentagon config set/get`: verifier URL and salt.

use anyhow::Result;

use pentagon_cli::storage::{self, Storage};

pub fn set(key: &str, value: &str) -> Result<()> {
    let storage = Storage::open()?;
    let mut config = storage.load_config()?;

    match key {
        "verifier" => {
            if !storage::is_ws_url(value) {
                anyhow::bail!("verifier URL must start with ws:// or wss://");
            }
            config.verifier = value.to_string();
            storage.save_config(&config)?;
            eprintln!("verifier = {value}");
        }
        "salt" => anyhow::bail!(
            "salt is generated on first use and seals the stored credential; it cannot be set"
        ),
        _ => anyhow::bail!("unknown config key: {key} (valid keys: verifier)"),
    }

    Ok(())
}

pub fn get(key: &str) -> Result<()> {
    let storage = Storage::open()?;

    match key {
        "verifier" => println!("{}", storage.load_config()?.verifier),
        "salt" => println!("{}", storage.load_or_init_config()?.salt),
        _ => anyhow::bail!("unknown config key: {key} (valid keys: verifier, salt)"),
    }

    Ok(())
}
