//! Burn Ban API Library
//!
//! Exposes the cache, data, CLI and server modules for the binary and for
//! integration tests.

pub mod cache;
pub mod cli;
pub mod data;
pub mod error;
pub mod server;
