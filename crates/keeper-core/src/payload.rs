//! Typed payloads packed into a record's opaque field

use crate::record::RecordType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload errors
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("mandatory field is not set: {0}")]
    MissingFields(&'static str),

    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Something that can be stored as a record's opaque field
pub trait Payload: Sized {
    /// The record type that carries this payload
    const RECORD_TYPE: RecordType;

    /// Serialize into the opaque string
    fn pack(&self) -> Result<String, PayloadError>;

    /// Parse back from the opaque string
    fn unpack(opaque: &str) -> Result<Self, PayloadError>;

    /// Validate mandatory fields
    fn check(&self) -> Result<(), PayloadError>;
}

fn pack_json<T: Serialize>(value: &T) -> Result<String, PayloadError> {
    Ok(serde_json::to_string(value)?)
}

fn unpack_json<T: DeserializeOwned>(opaque: &str) -> Result<T, PayloadError> {
    Ok(serde_json::from_str(opaque)?)
}

/// Login credentials for some resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub password: String,
}

impl Payload for Account {
    const RECORD_TYPE: RecordType = RecordType::Account;

    fn pack(&self) -> Result<String, PayloadError> {
        pack_json(self)
    }

    fn unpack(opaque: &str) -> Result<Self, PayloadError> {
        unpack_json(opaque)
    }

    fn check(&self) -> Result<(), PayloadError> {
        // url is optional
        if self.user_name.is_empty() || self.password.is_empty() {
            return Err(PayloadError::MissingFields("user name or password"));
        }
        Ok(())
    }
}

/// Free-form text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub text: String,
}

impl Payload for Note {
    const RECORD_TYPE: RecordType = RecordType::Note;

    fn pack(&self) -> Result<String, PayloadError> {
        pack_json(self)
    }

    fn unpack(opaque: &str) -> Result<Self, PayloadError> {
        unpack_json(opaque)
    }

    fn check(&self) -> Result<(), PayloadError> {
        Ok(())
    }
}

/// Payment card details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    #[serde(default)]
    pub holder: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub exp_month: u32,
    #[serde(default)]
    pub exp_year: u32,
    #[serde(default)]
    pub cvc: String,
}

impl Payload for Card {
    const RECORD_TYPE: RecordType = RecordType::Card;

    fn pack(&self) -> Result<String, PayloadError> {
        pack_json(self)
    }

    fn unpack(opaque: &str) -> Result<Self, PayloadError> {
        unpack_json(opaque)
    }

    fn check(&self) -> Result<(), PayloadError> {
        if self.holder.is_empty()
            || self.number.is_empty()
            || self.exp_month == 0
            || self.exp_year == 0
            || self.cvc.is_empty()
        {
            return Err(PayloadError::MissingFields(
                "holder, number, expiry month, expiry year or CVC",
            ));
        }
        Ok(())
    }
}

/// Base64-encoded file contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binary {
    pub data: String,
}

impl Payload for Binary {
    const RECORD_TYPE: RecordType = RecordType::Binary;

    // stored as-is, no JSON wrapper
    fn pack(&self) -> Result<String, PayloadError> {
        Ok(self.data.clone())
    }

    fn unpack(opaque: &str) -> Result<Self, PayloadError> {
        Ok(Self {
            data: opaque.to_string(),
        })
    }

    fn check(&self) -> Result<(), PayloadError> {
        Ok(())
    }
}
