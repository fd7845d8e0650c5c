//! Offline-fallback synchronization
//!
//! The server is the authority. Reads go to it first and drop back to the
//! local cache only when it cannot be reached; a rejection from the server is
//! an answer and is passed through untouched. Writes must reach the server,
//! and the cache follows only after they succeed, so it can lag behind the
//! server but never runs ahead of it.

use keeper_core::{NewUser, Record, RecordType, Records};
use record_store::{RecordStore, StoreError};

use crate::error::Result;
use crate::remote::RemoteApi;

/// Remote caller paired with an optional local cache
pub struct SyncClient<R> {
    remote: R,
    cache: Option<RecordStore>,
    user: String,
}

impl<R: RemoteApi> SyncClient<R> {
    /// `cache` must be a [`record_store::StoreMode::Cache`] store, or `None`
    /// to run without offline support
    pub fn new(remote: R, cache: Option<RecordStore>, user: impl Into<String>) -> Self {
        Self {
            remote,
            cache,
            user: user.into(),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn cache(&self) -> Option<&RecordStore> {
        self.cache.as_ref()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Fetch a record, refreshing its cached copy
    pub fn get_by_id(&self, id: i64) -> Result<Record> {
        match self.remote.get_record_by_id(id) {
            Ok(record) => {
                self.mirror(id, &record);
                Ok(record)
            }
            Err(e) if e.is_unreachable() => {
                tracing::debug!(id, error = %e, "reading record from cache");
                self.from_cache(format!("record id {}", id), |cache| {
                    cache.get_record_by_id(&self.user, id)
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_record_id(&self, record_type: RecordType, name: &str) -> Result<i64> {
        match self.remote.get_record_id(record_type, name) {
            Ok(id) => Ok(id),
            Err(e) if e.is_unreachable() => {
                tracing::debug!(%record_type, name, error = %e, "resolving id from cache");
                self.from_cache(format!("{} record {}", record_type, name), |cache| {
                    cache.get_record_id(&self.user, record_type, name)
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the id, then fetch by id; both steps may fall back
    pub fn get_by_type_name(&self, record_type: RecordType, name: &str) -> Result<Record> {
        let id = self.get_record_id(record_type, name)?;
        self.get_by_id(id)
    }

    pub fn list_by_type(&self, record_type: RecordType) -> Result<Records> {
        match self.remote.list_records_by_type(record_type) {
            Ok(records) => Ok(records),
            Err(e) if e.is_unreachable() => {
                tracing::debug!(%record_type, error = %e, "listing from cache");
                self.list_cached(|cache| cache.list_records_by_type(&self.user, record_type))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_all(&self) -> Result<Records> {
        match self.remote.list_records() {
            Ok(records) => Ok(records),
            Err(e) if e.is_unreachable() => {
                tracing::debug!(error = %e, "listing from cache");
                self.list_cached(|cache| cache.list_records(&self.user))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Store a new record, returning the id the server assigned
    pub fn store(&self, record: &Record) -> Result<i64> {
        let id = self.remote.store_record(record)?;
        self.mirror(id, record);
        Ok(id)
    }

    pub fn update_by_id(&self, id: i64, record: &Record) -> Result<()> {
        self.remote.update_record_by_id(id, record)?;
        self.mirror(id, record);
        Ok(())
    }

    /// Update the record known by type and name, returning its id
    pub fn update_by_type_name(
        &self,
        record_type: RecordType,
        name: &str,
        record: &Record,
    ) -> Result<i64> {
        let id = self.get_record_id(record_type, name)?;
        self.update_by_id(id, record)?;
        Ok(id)
    }

    pub fn delete_by_id(&self, id: i64) -> Result<()> {
        self.remote.delete_record_by_id(id)?;

        if let Some(cache) = &self.cache {
            match cache.delete_record_by_id(&self.user, id) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => tracing::warn!(id, error = %e, "failed to drop record from cache"),
            }
        }
        Ok(())
    }

    /// Delete the record known by type and name, returning its former id
    pub fn delete_by_type_name(&self, record_type: RecordType, name: &str) -> Result<i64> {
        let id = self.get_record_id(record_type, name)?;
        self.delete_by_id(id)?;
        Ok(id)
    }

    /// Pull every record of one type into the cache
    ///
    /// Returns the number of records mirrored. Records deleted on the server
    /// by another client stay cached until `clean_cache`.
    pub fn sync_by_type(&self, record_type: RecordType) -> Result<usize> {
        if self.cache.is_none() {
            tracing::warn!("no cache configured, nothing to sync");
            return Ok(0);
        }

        let listed = self.remote.list_records_by_type(record_type)?;
        for id in listed.keys() {
            self.get_by_id(*id)?;
        }

        tracing::info!(%record_type, count = listed.len(), "synced");
        Ok(listed.len())
    }

    pub fn sync_all(&self) -> Result<usize> {
        let mut total = 0;
        for record_type in RecordType::ALL {
            total += self.sync_by_type(record_type)?;
        }
        Ok(total)
    }

    /// Drop every cached record of the user, returning how many were removed
    pub fn clean_cache(&self) -> Result<usize> {
        let Some(cache) = &self.cache else {
            return Ok(0);
        };

        let cached = cache.list_records(&self.user)?;
        for id in cached.keys() {
            cache.delete_record_by_id(&self.user, *id)?;
        }

        tracing::info!(count = cached.len(), "cache cleaned");
        Ok(cached.len())
    }

    /// Register the user this client acts for
    pub fn register(&self, full_name: &str, password: &str) -> Result<i64> {
        let user = NewUser {
            name: self.user.clone(),
            full_name: full_name.to_string(),
            password: password.to_string(),
        };
        Ok(self.remote.register_user(&user)?)
    }

    /// Check the server answers and accepts the credentials
    pub fn verify(&self) -> Result<String> {
        Ok(self.remote.ping()?)
    }

    pub fn change_password(&self, new_password: &str) -> Result<()> {
        Ok(self.remote.change_password(new_password)?)
    }

    /// Write a server copy into the cache; failures are only logged
    fn mirror(&self, id: i64, record: &Record) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store_record_with_id(id, &self.user, record) {
                tracing::warn!(id, error = %e, "failed to update cache");
            }
        }
    }

    fn from_cache<T>(
        &self,
        what: String,
        read: impl FnOnce(&RecordStore) -> record_store::Result<T>,
    ) -> Result<T> {
        match &self.cache {
            Some(cache) => Ok(read(cache)?),
            None => Err(StoreError::NotFound(what).into()),
        }
    }

    fn list_cached(
        &self,
        read: impl FnOnce(&RecordStore) -> record_store::Result<Records>,
    ) -> Result<Records> {
        match &self.cache {
            Some(cache) => Ok(read(cache)?),
            None => Ok(Records::new()),
        }
    }
}
