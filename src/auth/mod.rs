//! Authentication and authorization subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <plaintext>
//!     → authenticator.rs (parse header, validate format)
//!     → token.rs (hash, resolve scope=authentication, check expiry)
//!     → authorizer.rs (activation, then capability codes)
//! ```
//!
//! # Design Decisions
//! - Plaintext tokens are never persisted; lookups go by SHA-256 hash
//! - Credential failures are indistinguishable to the caller
//! - An inactive account is always 403

pub mod authenticator;
pub mod authorizer;
pub mod token;

pub use authenticator::Authenticator;
pub use authorizer::Authorizer;
pub use token::{Token, TokenError, TokenHash, TokenLifecycle, ValidationErrors};
