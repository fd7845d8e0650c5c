use thiserror::Error;

use envelope::CryptError;
use keeper_core::{PayloadError, RecordType};
use record_store::StoreError;

use crate::remote::RemoteError;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Cache: {0}")]
    Cache(#[from] StoreError),

    #[error("cannot decrypt: {0}")]
    Crypt(#[from] CryptError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Record {id} is a {found} record, not {expected}")]
    WrongType {
        id: i64,
        expected: RecordType,
        found: RecordType,
    },
}

impl ClientError {
    /// The addressed user or record does not exist, remotely or in the cache
    pub fn is_not_found(&self) -> bool {
        match self {
            ClientError::Cache(e) => e.is_not_found(),
            ClientError::Remote(e) => e.status() == Some(404),
            _ => false,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, ClientError::Remote(e) if e.is_unreachable())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
