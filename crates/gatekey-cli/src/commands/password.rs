//! `gatekey hash-password` - Produce an Argon2 hash for the `users:` section.

use std::io::BufRead;

pub fn hash(password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password(std::io::stdin().lock())?,
    };

    println!("{}", hash_to_string(&password)?);
    Ok(())
}

fn hash_to_string(password: &str) -> anyhow::Result<String> {
    anyhow::ensure!(!password.is_empty(), "Password must not be empty");
    Ok(gatekey_server::auth::hash_password(password)?)
}

/// Read one line, without its line terminator.
fn read_password(mut input: impl BufRead) -> anyhow::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
