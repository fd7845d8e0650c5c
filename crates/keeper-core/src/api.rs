//! JSON bodies exchanged between the client and the server

use serde::{Deserialize, Serialize};

/// Registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    pub password: String,
}

/// Password change request, sent by an authenticated user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordChange {
    pub password: String,
}

/// Plain status reply, also used for every error reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new("OK")
    }
}

/// Reply carrying the id of a created or addressed entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdResponse {
    #[serde(default)]
    pub name: String,
    pub status: String,
    pub id: i64,
}

impl IdResponse {
    pub fn ok(name: impl Into<String>, id: i64) -> Self {
        Self {
            name: name.into(),
            status: "OK".to_string(),
            id,
        }
    }
}
