#![doc = include_str!("../README.md")]

pub mod config;
pub mod discovery;
pub mod error;
pub mod oidc;
pub mod pkce;
pub mod session;
pub mod store;

// Re-exports for convenient access
pub use config::OidcConfig;
pub use discovery::DiscoveryDocument;
pub use error::Error;
pub use oidc::{OidcClient, RevocationStatus, TokenResponse, UserInfo};
pub use pkce::{generate_code_challenge, generate_code_verifier, generate_state};
pub use session::{Credentials, PkceContext};
pub use store::{
    CredentialStore, KeyValueBackend, KeyValueCredentialStore, MemoryCredentialStore,
    MemoryKeyValueBackend,
};
