//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → path.rs (canonical path, or 400)
//!     → router.rs (policy lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: route pipeline or the default pipeline
//!
//! Route Compilation (at startup and on reload):
//!     RouteConfig[]
//!     → Sort by priority
//!     → Compile matchers and pipelines
//!     → Freeze as immutable PolicyRouter
//! ```
//!
//! # Design Decisions
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always selects the same policy
//! - First match wins

pub mod matcher;
pub mod path;
pub mod router;

pub use path::{canonicalize, PathError};
pub use router::{PipelineParts, PolicyRouter, RouteMatch};
