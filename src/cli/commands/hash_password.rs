//! Hash password command handler

use std::io::BufRead;

use anyhow::Context;

use crate::auth::CredentialHasher;
use crate::config::Config;

pub fn cmd_hash_password(config: &Config, password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    let hasher = CredentialHasher::new(&config.security)
        .map_err(|e| anyhow::anyhow!("Invalid credential hasher settings: {e}"))?;
    let hash = hasher
        .hash(&password)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("{hash}");
    Ok(())
}
