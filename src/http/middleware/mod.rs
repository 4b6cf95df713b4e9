pub mod admission;

pub use admission::{admission_middleware, AdmissionState, X_ACCOUNT_ID};
