//! Typed, encrypted access to records
//!
//! Payloads are packed and sealed here before they reach the [`SyncClient`];
//! the server and the cache only ever see ciphertext.

use envelope::{decrypt_record, encrypt_record, Key};
use keeper_core::{Payload, Record, RecordType, Records};

use crate::error::{ClientError, Result};
use crate::remote::RemoteApi;
use crate::sync::SyncClient;

/// How a command addresses a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRef {
    Id(i64),
    Name(String),
}

/// A [`SyncClient`] together with the record key
pub struct Vault<R> {
    client: SyncClient<R>,
    key: Key,
}

impl<R: RemoteApi> Vault<R> {
    pub fn new(client: SyncClient<R>, key: Key) -> Self {
        Self { client, key }
    }

    pub fn client(&self) -> &SyncClient<R> {
        &self.client
    }

    pub fn list(&self, record_type: RecordType) -> Result<Records> {
        self.client.list_by_type(record_type)
    }

    pub fn list_all(&self) -> Result<Records> {
        self.client.list_all()
    }

    /// Resolve a reference to the record id
    pub fn resolve(&self, record_type: RecordType, target: &RecordRef) -> Result<i64> {
        match target {
            RecordRef::Id(id) => Ok(*id),
            RecordRef::Name(name) => self.client.get_record_id(record_type, name),
        }
    }

    /// Fetch and decrypt a record, returning it with its id
    pub fn get(&self, record_type: RecordType, target: &RecordRef) -> Result<(i64, Record)> {
        let id = self.resolve(record_type, target)?;
        let sealed = self.client.get_by_id(id)?;
        if sealed.record_type != record_type {
            return Err(ClientError::WrongType {
                id,
                expected: record_type,
                found: sealed.record_type,
            });
        }
        Ok((id, decrypt_record(&self.key, &sealed)?))
    }

    /// Validate, pack and encrypt a payload, then store it under `name`
    pub fn store<P: Payload>(&self, name: &str, payload: &P, meta: &str) -> Result<i64> {
        let sealed = self.seal(name, payload, meta)?;
        self.client.store(&sealed)
    }

    /// Replace the record with `id`
    pub fn update<P: Payload>(&self, id: i64, name: &str, payload: &P, meta: &str) -> Result<()> {
        let sealed = self.seal(name, payload, meta)?;
        self.client.update_by_id(id, &sealed)
    }

    pub fn delete(&self, record_type: RecordType, target: &RecordRef) -> Result<i64> {
        match target {
            RecordRef::Id(id) => {
                self.client.delete_by_id(*id)?;
                Ok(*id)
            }
            RecordRef::Name(name) => self.client.delete_by_type_name(record_type, name),
        }
    }

    fn seal<P: Payload>(&self, name: &str, payload: &P, meta: &str) -> Result<Record> {
        payload.check()?;
        let record = Record::new(name, P::RECORD_TYPE, payload.pack()?, meta);
        Ok(encrypt_record(&self.key, &record)?)
    }
}
