//! Command implementations.

pub mod bundle;
