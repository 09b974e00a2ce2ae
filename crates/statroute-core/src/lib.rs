//! StatRoute Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout StatRoute:
//! - The fixed provider set and the provider adapter trait
//! - Routing decisions and routing input
//! - Collaborator traits (ranking oracle, catalog)
//! - Core error types

pub mod collaborator;
pub mod decision;
pub mod error;
pub mod provider;

pub use collaborator::{Candidate, Catalog, OracleError, RankRequest, RankResult, RankingOracle};
pub use decision::{MatchType, RouteInput, RoutingDecision};
pub use error::{Error, Result};
pub use provider::{AdapterError, DataQuery, Frequency, Provider, ProviderAdapter};
