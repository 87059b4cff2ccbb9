// zenform-api: Async Rust client for the MLOps server REST API

pub mod auth;
pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use auth::Credentials;
pub use client::ZenmlClient;
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
