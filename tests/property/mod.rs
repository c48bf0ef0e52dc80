//! Property-based tests for configuration overlay precedence
