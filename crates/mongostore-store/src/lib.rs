//! # mongostore-store
//!
//! Session store backends for MongoStore. Supports two modes:
//!
//! - **mongodb**: one MongoDB collection, via [`mongostore_database`]
//! - **memory**: in-process map using [dashmap](https://crates.io/crates/dashmap)
//!
//! The backend is selected at runtime based on configuration.

#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;

pub use provider::SessionStoreManager;
