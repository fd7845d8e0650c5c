use keeper_core::Record;

use crate::{decrypt_string, encrypt_string, Key, Result};

/// Encrypt the payload fields of a record
///
/// `opaque` and `meta` are sealed independently, each with its own nonce.
pub fn encrypt_record(key: &Key, record: &Record) -> Result<Record> {
    Ok(Record {
        name: record.name.clone(),
        record_type: record.record_type,
        opaque: encrypt_string(key, &record.opaque)?,
        meta: encrypt_string(key, &record.meta)?,
    })
}

/// Inverse of [`encrypt_record`]; both fields must decrypt
pub fn decrypt_record(key: &Key, record: &Record) -> Result<Record> {
    Ok(Record {
        name: record.name.clone(),
        record_type: record.record_type,
        opaque: decrypt_string(key, &record.opaque)?,
        meta: decrypt_string(key, &record.meta)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{derive_key, CryptError};
    use keeper_core::RecordType;

    #[test]
    fn test_record_round_trip() {
        let key = derive_key(b"a long passphrase");
        let record = Record::new("email", RecordType::Account, r#"{"user_name":"a"}"#, "work");

        let sealed = encrypt_record(&key, &record).unwrap();
        assert_eq!(sealed.name, "email");
        assert_eq!(sealed.record_type, RecordType::Account);
        assert_ne!(sealed.opaque, record.opaque);
        assert_ne!(sealed.meta, record.meta);

        assert_eq!(decrypt_record(&key, &sealed).unwrap(), record);
    }

    #[test]
    fn test_empty_fields_still_sealed() {
        let key = derive_key(b"a long passphrase");
        let record = Record::new("todo", RecordType::Note, "", "");

        let sealed = encrypt_record(&key, &record).unwrap();
        assert!(!sealed.opaque.is_empty());
        assert!(!sealed.meta.is_empty());
        assert_eq!(decrypt_record(&key, &sealed).unwrap(), record);
    }

    #[test]
    fn test_one_bad_field_fails_the_record() {
        let key = derive_key(b"a long passphrase");
        let mut sealed =
            encrypt_record(&key, &Record::new("todo", RecordType::Note, "x", "y")).unwrap();
        sealed.meta = "00".repeat(4);

        assert!(matches!(
            decrypt_record(&key, &sealed),
            Err(CryptError::Decryption(_))
        ));
    }
}
