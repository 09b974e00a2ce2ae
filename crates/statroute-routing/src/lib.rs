//! StatRoute Routing Engine
//!
//! This crate decides which data provider should serve a request:
//! - Country and region-group lookup
//! - Keyword tables and misrouting corrections
//! - Deterministic priority cascade with static fallback chains
//! - Optional oracle-assisted ranking behind hard guardrails

pub mod engine;
pub mod fallback;
pub mod heuristics;
pub mod hybrid;
pub mod patterns;
pub mod region;
pub mod tables;

// Re-export commonly used types
pub use engine::RoutingEngine;
pub use fallback::FallbackMap;
pub use hybrid::{HybridConfig, HybridRanker, MAX_ORACLE_RETRIES};
pub use patterns::{PatternMatch, PatternMatcher};
pub use region::{CodeFormat, RegionResolver};
pub use tables::{RoutingTables, TableError};
