//! API clients for external services
//!
//! - StreamHive: catalog, authentication and watch progress

pub mod streamhive;

pub use streamhive::{ApiError, LoginResponse, StreamHiveClient};
