//! Connection admission driven by node health.

pub mod admission;


pub use admission::{AdmissionError, AdmissionGate, HealthSource, DEFAULT_WARM_RATE};
