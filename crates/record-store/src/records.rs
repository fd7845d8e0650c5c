//! Ownership-scoped record operations

use rusqlite::{params, OptionalExtension, Row};

use keeper_core::{Record, RecordType, Records};

use crate::{
    map_write_error, record_type_at, RecordStore, Result, StoreError, StoreMode,
    MIN_USER_NAME_LEN,
};

const SELECT_FULL: &str = "SELECT records.name, records.type, records.opaque, records.meta
     FROM records JOIN users ON records.user_id = users.id";

fn full_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        name: row.get(0)?,
        record_type: record_type_at(row, 1)?,
        opaque: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        meta: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
    })
}

fn describe(record_type: RecordType, name: &str) -> String {
    format!("{} record {}", record_type, name)
}

impl RecordStore {
    /// Store a new record for `owner`, returning the assigned id
    pub fn store_record(&self, owner: &str, record: &Record) -> Result<i64> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO records (user_id, name, type, opaque, meta)
             VALUES ((SELECT id FROM users WHERE user = ?1), ?2, ?3, ?4, ?5)",
            params![
                owner,
                record.name,
                record.record_type.as_str(),
                record.opaque,
                record.meta
            ],
        )
        .map_err(|e| map_write_error(e, &describe(record.record_type, &record.name)))?;

        Ok(conn.last_insert_rowid())
    }

    /// Mirror a record under an id assigned elsewhere
    ///
    /// Overwrites: whatever the cache holds for `id`, under any user, is
    /// replaced, so repeated reads of the same record refresh it in place. A
    /// cached row with the same type and name under a different id is dropped
    /// as well, since the server keeps that pair unique. The owner is
    /// registered on first use.
    pub fn store_record_with_id(&self, id: i64, owner: &str, record: &Record) -> Result<()> {
        if self.mode != StoreMode::Cache {
            return Err(StoreError::CacheOnly);
        }
        if owner.chars().count() < MIN_USER_NAME_LEN {
            return Err(StoreError::Invalid(format!("user name {}", owner)));
        }

        let subject = describe(record.record_type, &record.name);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO users (user, full_name, password_hash) VALUES (?1, '', '')",
            params![owner],
        )?;

        // server ids are global, so whoever held this id locally is stale
        let replaced = tx.execute("DELETE FROM records WHERE id = ?1", params![id])?;

        let evicted = tx.execute(
            "DELETE FROM records WHERE id IN
             (SELECT records.id FROM records JOIN users ON records.user_id = users.id
              WHERE users.user = ?1 AND records.type = ?2 AND records.name = ?3
              AND records.id != ?4)",
            params![owner, record.record_type.as_str(), record.name, id],
        )?;

        tx.execute(
            "INSERT INTO records (id, user_id, name, type, opaque, meta)
             VALUES (?1, (SELECT id FROM users WHERE user = ?2), ?3, ?4, ?5, ?6)",
            params![
                id,
                owner,
                record.name,
                record.record_type.as_str(),
                record.opaque,
                record.meta
            ],
        )
        .map_err(|e| map_write_error(e, &subject))?;

        tx.commit()?;

        tracing::debug!(id, replaced, evicted, "mirrored {}", subject);
        Ok(())
    }

    /// Look up the id of a record by type and name
    pub fn get_record_id(&self, owner: &str, record_type: RecordType, name: &str) -> Result<i64> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT records.id
             FROM records JOIN users ON records.user_id = users.id
             WHERE users.user = ?1 AND records.type = ?2 AND records.name = ?3",
            params![owner, record_type.as_str(), name],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(describe(record_type, name)))
    }

    /// Get a full record by id
    pub fn get_record_by_id(&self, owner: &str, id: i64) -> Result<Record> {
        let conn = self.lock()?;

        conn.query_row(
            &format!("{} WHERE users.user = ?1 AND records.id = ?2", SELECT_FULL),
            params![owner, id],
            full_record,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("record id {}", id)))
    }

    /// Get a full record by type and name
    pub fn get_record_by_type_name(
        &self,
        owner: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Record> {
        let conn = self.lock()?;

        conn.query_row(
            &format!(
                "{} WHERE users.user = ?1 AND records.type = ?2 AND records.name = ?3",
                SELECT_FULL
            ),
            params![owner, record_type.as_str(), name],
            full_record,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(describe(record_type, name)))
    }

    /// List every record of `owner`, names and types only
    pub fn list_records(&self, owner: &str) -> Result<Records> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT records.id, records.name, records.type
             FROM records JOIN users ON records.user_id = users.id
             WHERE users.user = ?1 ORDER BY records.id",
        )?;

        let rows = stmt.query_map(params![owner], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                Record::summary(row.get::<_, String>(1)?, record_type_at(row, 2)?),
            ))
        })?;

        let mut records = Records::new();
        for row in rows {
            let (id, record) = row?;
            records.insert(id, record);
        }
        Ok(records)
    }

    /// List the records of one type, names and types only
    pub fn list_records_by_type(&self, owner: &str, record_type: RecordType) -> Result<Records> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT records.id, records.name
             FROM records JOIN users ON records.user_id = users.id
             WHERE users.user = ?1 AND records.type = ?2 ORDER BY records.id",
        )?;

        let rows = stmt.query_map(params![owner, record_type.as_str()], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Records::new();
        for row in rows {
            let (id, name) = row?;
            records.insert(id, Record::summary(name, record_type));
        }
        Ok(records)
    }

    /// Replace name, type, opaque and meta of the record with `id`
    pub fn update_record_by_id(&self, owner: &str, id: i64, record: &Record) -> Result<()> {
        let conn = self.lock()?;

        let updated = conn
            .execute(
                "UPDATE records SET name = ?1, type = ?2, opaque = ?3, meta = ?4
                 WHERE id IN
                 (SELECT records.id FROM records JOIN users ON records.user_id = users.id
                  WHERE users.user = ?5 AND records.id = ?6)",
                params![
                    record.name,
                    record.record_type.as_str(),
                    record.opaque,
                    record.meta,
                    owner,
                    id
                ],
            )
            .map_err(|e| map_write_error(e, &describe(record.record_type, &record.name)))?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!("record id {}", id)));
        }
        Ok(())
    }

    /// Replace the record currently known by `record_type` and `name`
    pub fn update_record_by_type_name(
        &self,
        owner: &str,
        record_type: RecordType,
        name: &str,
        record: &Record,
    ) -> Result<()> {
        let conn = self.lock()?;

        let updated = conn
            .execute(
                "UPDATE records SET name = ?1, type = ?2, opaque = ?3, meta = ?4
                 WHERE id IN
                 (SELECT records.id FROM records JOIN users ON records.user_id = users.id
                  WHERE users.user = ?5 AND records.type = ?6 AND records.name = ?7)",
                params![
                    record.name,
                    record.record_type.as_str(),
                    record.opaque,
                    record.meta,
                    owner,
                    record_type.as_str(),
                    name
                ],
            )
            .map_err(|e| map_write_error(e, &describe(record.record_type, &record.name)))?;

        if updated == 0 {
            return Err(StoreError::NotFound(describe(record_type, name)));
        }
        Ok(())
    }

    /// Delete the record with `id`
    pub fn delete_record_by_id(&self, owner: &str, id: i64) -> Result<()> {
        let conn = self.lock()?;

        let deleted = conn.execute(
            "DELETE FROM records WHERE id IN
             (SELECT records.id FROM records JOIN users ON records.user_id = users.id
              WHERE users.user = ?1 AND records.id = ?2)",
            params![owner, id],
        )?;

        if deleted == 0 {
            return Err(StoreError::NotFound(format!("record id {}", id)));
        }
        Ok(())
    }

    /// Delete the record known by `record_type` and `name`
    pub fn delete_record_by_type_name(
        &self,
        owner: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<()> {
        let conn = self.lock()?;

        let deleted = conn.execute(
            "DELETE FROM records WHERE id IN
             (SELECT records.id FROM records JOIN users ON records.user_id = users.id
              WHERE users.user = ?1 AND records.type = ?2 AND records.name = ?3)",
            params![owner, record_type.as_str(), name],
        )?;

        if deleted == 0 {
            return Err(StoreError::NotFound(describe(record_type, name)));
        }
        Ok(())
    }
}
