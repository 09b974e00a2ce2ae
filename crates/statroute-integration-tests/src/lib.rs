//! End-to-end integration tests for StatRoute
//!
//! These tests load configuration files from disk and wire the dispatcher
//! together the way a host application would. Scenario tests with test
//! adapters live under `tests/`.
