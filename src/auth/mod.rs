//! User authentication for the file gateway.
//!
//! Provides:
//! - Account registration with username/password (PBKDF2-HMAC-SHA256 + per-account salt)
//! - Stateless session tokens (HS256-signed claims, fixed lifetime, no server-side state)
//!
//! ## Design Decisions
//! - Re-registering an existing username is rejected, never overwritten.
//! - Sign-in failures are uniform: unknown user and wrong password look identical.
//! - Sessions cannot be revoked; changing the secret invalidates every token.

pub mod credentials;
pub mod session;

pub use credentials::{Account, CredentialError, CredentialStore};
pub use session::{Claims, IssuedToken, SessionError, SessionKeys};
