//! Records as they are stored and transported
//!
//! A record is addressed by its owner, type and name. Only `opaque` and `meta`
//! carry secret material; `name` and `record_type` stay readable because the
//! stores index on them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unknown record type tag
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown record type: {0}")]
pub struct RecordTypeError(pub String);

/// The kind of secret a record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    #[serde(rename = "acc")]
    Account,
    #[serde(rename = "note")]
    Note,
    #[serde(rename = "card")]
    Card,
    #[serde(rename = "bin")]
    Binary,
}

impl RecordType {
    /// Every record type, in display order
    pub const ALL: [RecordType; 4] = [
        RecordType::Account,
        RecordType::Note,
        RecordType::Card,
        RecordType::Binary,
    ];

    /// Wire and storage tag
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Account => "acc",
            RecordType::Note => "note",
            RecordType::Card => "card",
            RecordType::Binary => "bin",
        }
    }
}

impl FromStr for RecordType {
    type Err = RecordTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "acc" => Ok(RecordType::Account),
            "note" => Ok(RecordType::Note),
            "card" => Ok(RecordType::Card),
            "bin" => Ok(RecordType::Binary),
            other => Err(RecordTypeError(other.to_string())),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored record
///
/// Listings return records with empty `opaque` and `meta`; empty fields are
/// left out of the JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,

    pub record_type: RecordType,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub opaque: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub meta: String,
}

/// Records keyed by their store-assigned id
pub type Records = BTreeMap<i64, Record>;

impl Record {
    /// Create a record with payload and annotation
    pub fn new(
        name: impl Into<String>,
        record_type: RecordType,
        opaque: impl Into<String>,
        meta: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type,
            opaque: opaque.into(),
            meta: meta.into(),
        }
    }

    /// Create a metadata-only record, as returned by listings
    pub fn summary(name: impl Into<String>, record_type: RecordType) -> Self {
        Self::new(name, record_type, "", "")
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\n  Type: {}", self.record_type)?;
        write!(f, "\n  Name: {}", self.name)?;
        if !self.meta.is_empty() {
            write!(f, "\n  Meta info: {}", self.meta)?;
        }
        // binary payloads are written to a file instead
        if self.record_type != RecordType::Binary && !self.opaque.is_empty() {
            write!(f, "\n  Data: {}", self.opaque)?;
        }
        Ok(())
    }
}

/// Render a listing, one block per record
pub fn format_records(records: &Records) -> String {
    records
        .iter()
        .map(|(id, record)| format!("\nId: {}{}", id, record))
        .collect()
}
