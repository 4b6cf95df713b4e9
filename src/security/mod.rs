//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket)
//!     → Pass to authentication
//!
//! Background:
//!     reaper.rs → RateLimiter::sweep every interval
//! ```
//!
//! # Design Decisions
//! - One lock around the bucket table, held for O(1) work
//! - Denial is an outcome, not an error
//! - Time comes from an injectable clock

pub mod clock;
pub mod rate_limit;
pub mod reaper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limit::RateLimiter;
pub use reaper::BucketReaper;
