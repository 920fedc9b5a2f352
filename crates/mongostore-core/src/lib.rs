//! # mongostore-core
//!
//! Core crate for MongoStore. Contains the session store trait, configuration
//! schemas, session payload types with their expiry rules, and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other MongoStore crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
