//! keeper-client - client side of the keeper secret manager
//!
//! Talks to the server through [`RemoteApi`] and keeps a local
//! [`record_store::RecordStore`] as an offline mirror. Reads that cannot reach
//! the server are answered from the mirror; writes always need the server.

pub mod config;
pub mod error;
pub mod remote;
pub mod sync;
pub mod vault;

#[cfg(test)]
mod fake;

pub use config::{check_owner_only, load_key_file, ClientConfig};
pub use error::{ClientError, Result};
pub use remote::{HttpRemote, RemoteApi, RemoteError};
pub use sync::SyncClient;
pub use vault::{RecordRef, Vault};
