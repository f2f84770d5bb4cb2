//! Authenticated file-sharing gateway.
//!
//! Users sign up with a username/password, sign in to receive a short-lived
//! signed session cookie, and upload or download files under that identity.
//! Accounts and file metadata live in process memory; file bytes live in a
//! flat upload directory.

pub mod auth;
pub mod config;
pub mod files;
pub mod gateway;
pub mod store;

pub use auth::{CredentialStore, SessionKeys};
pub use config::Config;
pub use files::{FileRecord, MetadataStore};
pub use gateway::{run_gateway, AppState};
