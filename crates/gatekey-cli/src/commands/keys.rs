//! Key management commands.
//!
//! `gatekey keys generate` - Generate a new RSA signing keypair.

use anyhow::Context;
use gatekey_token::{KeyProvider, RsaKeyProvider};
use std::fs;
use std::path::PathBuf;

/// Generate a new RSA keypair.
pub fn generate(output: Option<PathBuf>, bits: usize) -> anyhow::Result<()> {
    let provider = RsaKeyProvider::new(bits)?;
    let keypair = provider
        .generate_key_pair()
        .context("Failed to generate RSA keypair")?;

    if let Some(output_dir) = output {
        fs::create_dir_all(&output_dir)?;

        let private_path = output_dir.join("private.pem");
        let public_path = output_dir.join("public.pem");
        keypair.save_to_files(&private_path, &public_path)?;

        println!("✔ Generated RSA {} bit keypair:", keypair.bits());
        println!("  Key ID:      {}", keypair.kid());
        println!("  Private key: {}", private_path.display());
        println!("  Public key:  {}", public_path.display());
        println!();
        println!("⚠️  Keep your private key secure! Never commit it to version control.");
        println!();
        println!("Reference it from the configuration:");
        println!("  jwt:");
        println!("    keys:");
        println!("      private_key_file: {}", private_path.display());
        println!();
        println!("or set it as an environment variable:");
        println!(
            "  export GATEKEY_PRIVATE_KEY=\"$(cat {})\"",
            private_path.display()
        );
    } else {
        println!("Private key (keep secure!):");
        print!("{}", keypair.private_key_pem()?);
        println!();
        println!("Public key (kid {}):", keypair.kid());
        print!("{}", keypair.public_key_pem()?);
        println!();
        println!("Use --output <dir> to save keys to files.");
    }

    Ok(())
}
