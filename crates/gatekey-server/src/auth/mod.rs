//! Credential checking and the login step.

pub mod authenticator;
pub mod interceptor;

pub use authenticator::{Authenticator, Credentials, StaticUserAuthenticator, hash_password};
pub use interceptor::{AuthenticationInterceptor, LoginInterceptor};
