//! Pure utility functions.
//!
//! These are helpers shared by the storage layer and the binaries.

pub mod bootstrap;
pub mod retry;
