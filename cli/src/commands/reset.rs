//! `pentagon reset`: forget the local credential.

use anyhow::Result;
use dialoguer::Confirm;

use pentagon_cli::storage::Storage;

pub fn run(yes: bool) -> Result<()> {
    let storage = Storage::open()?;
    if !storage.has_credential()? {
        eprintln!("No credential stored.");
        return Ok(());
    }

    if !yes {
        if !super::interactive() {
            anyhow::bail!("refusing to remove the credential without --yes");
        }
        let confirmed = Confirm::new()
            .with_prompt("Remove the stored credential? The verifier keeps its enrollment.")
            .default(false)
            .interact()?;
        if !confirmed {
            eprintln!("Aborted.");
            return Ok(());
        }
    }

    storage.clear_credential()?;
    eprintln!("Credential removed.");
    Ok(())
}
