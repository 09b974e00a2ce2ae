//! StatRoute Dispatch
//!
//! Ties routing, admission control and the response cache together:
//! - Loads and validates the dispatch configuration
//! - Walks a decision's provider chain until one adapter answers
//! - Fans a query out over several countries with bounded concurrency

pub mod batch;
pub mod bootstrap;
pub mod config;
pub mod dispatcher;

pub use batch::BatchOutcome;
pub use bootstrap::DispatcherBuilder;
pub use config::{BatchConfig, DispatchConfig, RoutingSettings};
pub use dispatcher::{DispatchOutcome, Dispatcher};
