//! Session payload and query types shared by every store backend.

pub mod filter;
pub mod session;

pub use filter::SessionFilter;
pub use session::{SessionCookie, SessionData};
