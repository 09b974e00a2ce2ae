//! StatRoute Admission Control
//!
//! This crate governs when calls to a provider may proceed:
//! - Minimum spacing between requests
//! - Sliding per-minute and per-hour windows
//! - Circuit breaker with an escalating cooldown schedule

pub mod circuit_breaker;
pub mod config;
pub mod controller;
pub mod window;

// Re-export commonly used types
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{AdmissionConfig, AdmissionSettings};
pub use controller::{AdmissionControl, CircuitStatus};
pub use window::SlidingWindow;
