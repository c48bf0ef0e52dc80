//! Configuration sources.

pub mod persisted_file;
