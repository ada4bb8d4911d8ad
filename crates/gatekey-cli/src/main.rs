use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "gatekey", version, about = "gatekey token CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Signing key management
    Keys {
        #[command(subcommand)]
        cmd: KeysCommand,
    },

    /// Issue, verify and inspect tokens
    Token {
        #[command(subcommand)]
        cmd: TokenCommand,
    },

    /// Hash a password for the `users:` section of the configuration.
    /// Reads the password from stdin unless --password is given.
    HashPassword {
        #[arg(long, env = "GATEKEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Run the login / verification HTTP server.
    Serve {
        /// Configuration file (YAML or TOML)
        #[arg(long, short, env = "GATEKEY_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Generate an RSA keypair (private.pem / public.pem)
    Generate {
        /// Directory to write the keys to. Prints them when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Modulus size in bits (at least 2048)
        #[arg(long, default_value_t = 2048)]
        bits: usize,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Issue a signed token for a user
    Issue {
        /// Private key: path to a PEM file, or PEM text
        #[arg(long, env = "GATEKEY_PRIVATE_KEY", hide_env_values = true)]
        key: Option<String>,

        /// Subject of the token
        #[arg(long)]
        user: String,

        /// Granted authority (repeatable, order is kept)
        #[arg(long = "authority")]
        authorities: Vec<String>,

        /// Configuration file supplying issuer and expiration
        #[arg(long, short, env = "GATEKEY_CONFIG")]
        config: Option<PathBuf>,

        /// Write the token to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Verify a token's signature, issuer and expiry
    Verify {
        /// Public (or private) key: path to a PEM file, or PEM text
        #[arg(long, env = "GATEKEY_PUBLIC_KEY", hide_env_values = true)]
        key: Option<String>,

        /// Token, or a file containing it
        token: String,

        /// Configuration file supplying the expected issuer
        #[arg(long, short, env = "GATEKEY_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Decode a token without checking its signature
    Inspect {
        /// Token, or a file containing it
        token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays usable for tokens and keys.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Keys { cmd } => match cmd {
            KeysCommand::Generate { output, bits } => commands::keys::generate(output, bits)?,
        },

        Command::Token { cmd } => match cmd {
            TokenCommand::Issue {
                key,
                user,
                authorities,
                config,
                output,
            } => commands::token::issue(key, user, authorities, config, output)?,
            TokenCommand::Verify { key, token, config } => {
                commands::token::verify(key, token, config)?
            }
            TokenCommand::Inspect { token } => commands::token::inspect(token)?,
        },

        Command::HashPassword { password } => commands::password::hash(password)?,

        Command::Serve { config } => commands::serve::run(config).await?,
    }

    Ok(())
}
