//! `pentagon status`: show configuration and enrollment.

use anyhow::Result;

use pentagon_cli::storage::Storage;

pub fn run() -> Result<()> {
    let storage = Storage::open()?;
    let config = storage.load_config()?;

    println!("directory: {}", storage.dir().display());
    println!("verifier:  {}", config.verifier);

    if config.salt.is_empty() {
        println!("enrolled:  no");
        return Ok(());
    }
    match storage.load_credential(&config.salt)? {
        Some(identity) => {
            println!("enrolled:  yes");
            println!("address:   {}", identity.address);
            println!("public key: {}", identity.public_key);
        }
        None => println!("enrolled:  no"),
    }
    Ok(())
}
