//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID)
//!     → middleware/admission.rs (select policy, run pipeline)
//!         rejected → response.rs (JSON error envelope)
//!         admitted → server.rs (forward to upstream with x-account-id)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::X_ACCOUNT_ID;
pub use request::X_REQUEST_ID;
pub use server::{GateComponents, HttpServer, ServerError};
