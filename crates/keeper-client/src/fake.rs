//! In-process stand-in for the keeper server, with an on/off switch

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use keeper_core::{NewUser, Record, RecordType, Records};
use record_store::{password_hash, RecordStore, StoreError, StoreMode};

use crate::remote::{RemoteApi, RemoteError, Result};

pub struct FakeRemote {
    store: RecordStore,
    user: String,
    password: Mutex<String>,
    online: AtomicBool,
}

impl FakeRemote {
    /// A server that does not know `user` yet
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            store: RecordStore::open_in_memory(StoreMode::Canonical).unwrap(),
            user: user.to_string(),
            password: Mutex::new(password.to_string()),
            online: AtomicBool::new(true),
        }
    }

    /// A server with `user` already registered
    pub fn registered(user: &str, password: &str) -> Self {
        let remote = Self::new(user, password);
        remote
            .store
            .create_user(user, "", &password_hash(password))
            .unwrap();
        remote
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// The canonical store behind the fake
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    fn connect(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unreachable("connection refused".to_string()))
        }
    }
}

fn reject(err: StoreError) -> RemoteError {
    let status = match &err {
        StoreError::NotFound(_) => 404,
        StoreError::AlreadyExists(_) => 409,
        StoreError::Invalid(_) => 400,
        _ => 500,
    };
    RemoteError::Rejected {
        status,
        message: err.to_string(),
    }
}

impl RemoteApi for FakeRemote {
    fn register_user(&self, user: &NewUser) -> Result<i64> {
        self.connect()?;
        self.store
            .create_user(&user.name, &user.full_name, &password_hash(&user.password))
            .map_err(reject)
    }

    fn ping(&self) -> Result<String> {
        self.connect()?;
        let password = self.password.lock().unwrap().clone();
        match self.store.verify_credentials(&self.user, &password) {
            Ok(true) => Ok(format!("OK. User {}", self.user)),
            _ => Err(RemoteError::Rejected {
                status: 403,
                message: "Forbidden".to_string(),
            }),
        }
    }

    fn change_password(&self, new_password: &str) -> Result<()> {
        self.connect()?;
        self.store
            .change_password(&self.user, &password_hash(new_password))
            .map_err(reject)?;
        *self.password.lock().unwrap() = new_password.to_string();
        Ok(())
    }

    fn list_records(&self) -> Result<Records> {
        self.connect()?;
        self.store.list_records(&self.user).map_err(reject)
    }

    fn list_records_by_type(&self, record_type: RecordType) -> Result<Records> {
        self.connect()?;
        self.store
            .list_records_by_type(&self.user, record_type)
            .map_err(reject)
    }

    fn get_record_by_id(&self, id: i64) -> Result<Record> {
        self.connect()?;
        self.store.get_record_by_id(&self.user, id).map_err(reject)
    }

    fn get_record_id(&self, record_type: RecordType, name: &str) -> Result<i64> {
        self.connect()?;
        self.store
            .get_record_id(&self.user, record_type, name)
            .map_err(reject)
    }

    fn store_record(&self, record: &Record) -> Result<i64> {
        self.connect()?;
        self.store.store_record(&self.user, record).map_err(reject)
    }

    fn update_record_by_id(&self, id: i64, record: &Record) -> Result<()> {
        self.connect()?;
        self.store
            .update_record_by_id(&self.user, id, record)
            .map_err(reject)
    }

    fn delete_record_by_id(&self, id: i64) -> Result<()> {
        self.connect()?;
        self.store.delete_record_by_id(&self.user, id).map_err(reject)
    }
}
