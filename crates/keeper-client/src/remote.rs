//! Calls into the keeper server
//!
//! Failures are split in two: [`RemoteError::Unreachable`] when no usable
//! answer came back at all, and [`RemoteError::Rejected`] when the server
//! answered with a non-success status. Only the first kind lets a reader fall
//! back to the local cache.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use keeper_core::{IdResponse, NewUser, PasswordChange, Record, RecordType, Records, StatusResponse};

/// Remote call errors
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("Server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected server response: {0}")]
    Protocol(String),
}

impl RemoteError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, RemoteError::Unreachable(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// The server operations the client relies on
///
/// Every call acts on behalf of the user the implementation was built for.
pub trait RemoteApi {
    fn register_user(&self, user: &NewUser) -> Result<i64>;

    /// Check that the server is up and accepts our credentials
    fn ping(&self) -> Result<String>;

    fn change_password(&self, new_password: &str) -> Result<()>;

    fn list_records(&self) -> Result<Records>;

    fn list_records_by_type(&self, record_type: RecordType) -> Result<Records>;

    fn get_record_by_id(&self, id: i64) -> Result<Record>;

    fn get_record_id(&self, record_type: RecordType, name: &str) -> Result<i64>;

    fn store_record(&self, record: &Record) -> Result<i64>;

    fn update_record_by_id(&self, id: i64, record: &Record) -> Result<()>;

    fn delete_record_by_id(&self, id: i64) -> Result<()>;
}

/// [`RemoteApi`] over HTTP with Basic authentication
pub struct HttpRemote {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl HttpRemote {
    pub fn new(
        base_url: &str,
        user: &str,
        password: &str,
        timeout: Duration,
        https_insecure: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(https_insecure)
            .build()
            .map_err(|e| RemoteError::Protocol(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, turning transport errors and non-success statuses
    /// into [`RemoteError`]
    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<StatusResponse>(&body)
            .map(|s| s.status)
            .unwrap_or(body);

        tracing::debug!(status = status.as_u16(), %message, "request rejected");
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request)?;
        // a body cut short counts as a lost connection
        let body = response
            .text()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Protocol(e.to_string()))
    }
}

impl RemoteApi for HttpRemote {
    fn register_user(&self, user: &NewUser) -> Result<i64> {
        let reply: IdResponse = self.send_json(self.client.post(self.url("/users")).json(user))?;
        Ok(reply.id)
    }

    fn ping(&self) -> Result<String> {
        let reply: StatusResponse = self.send_json(self.client.get(self.url("/ping")))?;
        Ok(reply.status)
    }

    fn change_password(&self, new_password: &str) -> Result<()> {
        let body = PasswordChange {
            password: new_password.to_string(),
        };
        let _: StatusResponse =
            self.send_json(self.client.put(self.url("/password")).json(&body))?;
        Ok(())
    }

    fn list_records(&self) -> Result<Records> {
        self.send_json(self.client.get(self.url("/records")))
    }

    fn list_records_by_type(&self, record_type: RecordType) -> Result<Records> {
        self.send_json(
            self.client
                .get(self.url(&format!("/records/by_type/{}", record_type))),
        )
    }

    fn get_record_by_id(&self, id: i64) -> Result<Record> {
        self.send_json(self.client.get(self.url(&format!("/records/{}", id))))
    }

    fn get_record_id(&self, record_type: RecordType, name: &str) -> Result<i64> {
        let path = record_id_path(record_type, name);
        let reply: IdResponse = self.send_json(self.client.get(self.url(&path)))?;
        Ok(reply.id)
    }

    fn store_record(&self, record: &Record) -> Result<i64> {
        let reply: IdResponse =
            self.send_json(self.client.post(self.url("/records")).json(record))?;
        Ok(reply.id)
    }

    fn update_record_by_id(&self, id: i64, record: &Record) -> Result<()> {
        let _: IdResponse = self.send_json(
            self.client
                .put(self.url(&format!("/records/{}", id)))
                .json(record),
        )?;
        Ok(())
    }

    fn delete_record_by_id(&self, id: i64) -> Result<()> {
        let _: StatusResponse =
            self.send_json(self.client.delete(self.url(&format!("/records/{}", id))))?;
        Ok(())
    }
}

/// Path resolving a name to an id; the name travels as one escaped segment
fn record_id_path(record_type: RecordType, name: &str) -> String {
    format!("/records/{}/{}", record_type, urlencoding::encode(name))
}
