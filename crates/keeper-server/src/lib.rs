//! keeper-server - HTTP API over the canonical record store
//!
//! One [`record_store::RecordStore`] in canonical mode is shared by every
//! handler. Clients authenticate with HTTP Basic credentials checked against
//! the store's user registry.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

pub use config::ServerArgs;
pub use error::ApiError;
pub use routes::router;
