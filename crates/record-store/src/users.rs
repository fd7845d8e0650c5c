//! User registry

use rusqlite::{params, OptionalExtension};

use crate::{map_write_error, password_hash, RecordStore, Result, StoreError, MIN_USER_NAME_LEN};

impl RecordStore {
    /// Register a user, returning its id
    pub fn create_user(&self, name: &str, full_name: &str, password_hash: &str) -> Result<i64> {
        if name.chars().count() < MIN_USER_NAME_LEN {
            return Err(StoreError::Invalid(format!(
                "user name must be at least {} characters",
                MIN_USER_NAME_LEN
            )));
        }

        let conn = self.lock()?;

        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE user = ?1",
            params![name],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(StoreError::AlreadyExists(format!("user {}", name)));
        }

        conn.execute(
            "INSERT INTO users (user, full_name, password_hash) VALUES (?1, ?2, ?3)",
            params![name, full_name, password_hash],
        )
        .map_err(|e| map_write_error(e, &format!("user {}", name)))?;

        Ok(conn.last_insert_rowid())
    }

    /// Check a plaintext password against the stored hash
    ///
    /// A mismatch is `Ok(false)`; only an unknown user is an error.
    pub fn verify_credentials(&self, name: &str, password: &str) -> Result<bool> {
        let conn = self.lock()?;

        let stored: Option<Option<String>> = conn
            .query_row(
                "SELECT password_hash FROM users WHERE user = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            None => Err(StoreError::NotFound(format!("user {}", name))),
            Some(hash) => Ok(hash.unwrap_or_default() == password_hash(password)),
        }
    }

    /// Replace a user's password hash
    pub fn change_password(&self, name: &str, new_password_hash: &str) -> Result<()> {
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE user = ?2",
            params![new_password_hash, name],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("user {}", name)));
        }
        Ok(())
    }
}
