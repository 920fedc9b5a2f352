//! # mongostore-database
//!
//! MongoDB persistence for MongoStore: connection management from
//! configuration, the BSON session document codec, and
//! [`MongoSessionStore`], the MongoDB implementation of
//! [`SessionStore`](mongostore_core::traits::SessionStore).

pub mod connection;
pub mod document;
pub mod store;

pub use connection::MongoConnection;
pub use store::MongoSessionStore;
