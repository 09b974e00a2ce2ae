//! StatRoute Response Cache
//!
//! In-memory cache for provider responses:
//! - Canonical, provider-prefixed keys
//! - TTL chosen by series frequency
//! - Periodic sweep with bounded size

pub mod config;
pub mod key;
pub mod store;

// Re-export commonly used types
pub use config::CacheConfig;
pub use key::{canonical_json, compute_key, ttl_for};
pub use store::{CacheStats, ResponseCache};
