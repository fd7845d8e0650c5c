//! Keeper Core - Shared functionality for the keeper tools
//!
//! Record and payload types, the JSON shapes exchanged between client and
//! server, and the standard on-disk locations.

pub mod api;
pub mod paths;
pub mod payload;
pub mod record;

pub use api::{IdResponse, NewUser, PasswordChange, StatusResponse};
pub use paths::Paths;
pub use payload::{Account, Binary, Card, Note, Payload, PayloadError};
pub use record::{format_records, Record, RecordType, RecordTypeError, Records};
