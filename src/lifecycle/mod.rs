//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build store → Start background tasks → Listen
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Stop reaper → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Every background task subscribes to one shutdown broadcast
//! - Background task panics are caught and logged (background.rs)

pub mod background;
pub mod shutdown;
pub mod signals;

pub use background::spawn_supervised;
pub use shutdown::Shutdown;
