//! # gatekey-core
//!
//! Configuration types shared across all gatekey crates.

pub mod config;

pub use config::{
    CONFIG_ENV, ConfigError, GatekeyConfig, HeaderConfig, JwtConfig, KeysConfig, ServerConfig,
    UserEntry,
};
