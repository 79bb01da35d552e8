//! Types shared by every PenLink client crate: ids, domain models, the
//! notification-socket wire frames and relative-time formatting.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod time;
pub mod types;

pub use error::PenlinkError;
