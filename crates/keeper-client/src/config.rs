//! Client configuration
//!
//! Configuration file: ~/.config/keeper/client.yaml (or `$KEEPER_CONFIG`)
//!
//! The file holds the account password, so like the key phrase file it must
//! not be readable by group or others.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use envelope::{derive_key, Key};
use keeper_core::Paths;
use zeroize::Zeroizing;

/// Shortest accepted key phrase, in bytes
pub const MIN_KEY_PHRASE_LEN: usize = 10;

/// Shortest accepted account password
pub const MIN_PASSWORD_LEN: usize = 5;

fn default_timeout_ms() -> u64 {
    1000
}

/// Client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub user_name: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub full_name: String,

    /// Base URL of the server, e.g. `http://localhost:8080`
    pub server_address: String,

    /// Local cache database; unset means the default location, empty
    /// disables offline support
    #[serde(default)]
    pub cache_file: Option<PathBuf>,

    pub key_phrase_file: PathBuf,

    /// Accept any server certificate
    #[serde(default)]
    pub https_insecure: bool,

    /// Per-request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ClientConfig {
    /// Location used when no path is given
    pub fn default_path() -> PathBuf {
        Paths::new().client_config()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        check_owner_only(path)?;

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read client config from {:?}", path))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse client config from {:?}", path))?;

        if config.user_name.is_empty() {
            bail!("user_name is not set in {:?}", path);
        }
        if config.server_address.is_empty() {
            bail!("server_address is not set in {:?}", path);
        }
        Ok(config)
    }

    /// Save configuration, readable by the owner only
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("Failed to write client config to {:?}", path))?;
        file.write_all(content.as_bytes())?;

        // mode() only applies to newly created files
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        Ok(())
    }

    pub fn cache_path(&self) -> Option<PathBuf> {
        match &self.cache_file {
            None => Some(Paths::new().cache_db()),
            Some(path) if path.as_os_str().is_empty() => None,
            Some(path) => Some(path.clone()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Refuse files that group or others can access
pub fn check_owner_only(path: &Path) -> Result<()> {
    let metadata =
        fs::metadata(path).with_context(|| format!("Failed to read {:?}", path))?;
    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        bail!(
            "{:?} is accessible by group or others (mode {:o}), run: chmod 600 {:?}",
            path,
            mode & 0o777,
            path
        );
    }
    Ok(())
}

/// Read the key phrase file and derive the record key from it
///
/// A single trailing newline is not part of the phrase.
pub fn load_key_file(path: &Path) -> Result<Key> {
    check_owner_only(path)?;

    let mut phrase = Zeroizing::new(
        fs::read(path).with_context(|| format!("Failed to read key phrase from {:?}", path))?,
    );
    if phrase.last() == Some(&b'\n') {
        phrase.pop();
        if phrase.last() == Some(&b'\r') {
            phrase.pop();
        }
    }

    if phrase.len() < MIN_KEY_PHRASE_LEN {
        bail!(
            "key phrase in {:?} is too short, need at least {} bytes",
            path,
            MIN_KEY_PHRASE_LEN
        );
    }
    Ok(derive_key(&phrase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &str, mode: u32) {
        fs::write(path, content).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    const SAMPLE: &str = r#"
user_name: alice
password: s3cr3t!
server_address: http://localhost:8080
cache_file: /tmp/keeper-cache.db
key_phrase_file: /tmp/keeper.key
"#;

    #[test]
    fn test_load_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("client.yaml");
        write_file(&path, SAMPLE, 0o600);

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.user_name, "alice");
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert!(!config.https_insecure);
        assert_eq!(
            config.cache_path(),
            Some(PathBuf::from("/tmp/keeper-cache.db"))
        );
    }

    #[test]
    fn test_empty_cache_file_disables_cache() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("client.yaml");
        let content = SAMPLE.replace("/tmp/keeper-cache.db", "\"\"");
        write_file(&path, &content, 0o600);

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.cache_path(), None);
    }

    #[test]
    fn test_missing_cache_file_uses_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("client.yaml");
        let content = SAMPLE.replace("cache_file: /tmp/keeper-cache.db\n", "");
        write_file(&path, &content, 0o600);

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.cache_path(), Some(Paths::new().cache_db()));
    }

    #[test]
    fn test_config_must_be_private() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("client.yaml");
        write_file(&path, SAMPLE, 0o644);

        assert!(ClientConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("client.yaml");
        write_file(&path, SAMPLE, 0o600);

        let mut config = ClientConfig::load_from(&path).unwrap();
        config.password = "n3w-pass".to_string();
        config.save_to(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(ClientConfig::load_from(&path).unwrap().password, "n3w-pass");
    }

    #[test]
    fn test_key_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("key");
        write_file(&path, "correct horse battery\n", 0o600);

        let key = load_key_file(&path).unwrap();
        assert_eq!(key.as_bytes(), derive_key(b"correct horse battery").as_bytes());
    }

    #[test]
    fn test_key_file_permissions() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("key");
        write_file(&path, "correct horse battery", 0o640);

        assert!(load_key_file(&path).is_err());
    }

    #[test]
    fn test_key_file_too_short() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("key");
        write_file(&path, "short\n", 0o600);

        let err = load_key_file(&path).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_key_file_newline_variants() {
        let tmp = TempDir::new().unwrap();
        let expected = derive_key(b"correct horse battery");

        for content in ["correct horse battery", "correct horse battery\r\n"] {
            let path = tmp.path().join("key");
            write_file(&path, content, 0o600);
            assert_eq!(load_key_file(&path).unwrap().as_bytes(), expected.as_bytes());
        }

        // only one newline is dropped
        let path = tmp.path().join("key");
        write_file(&path, "correct horse battery\n\n", 0o600);
        assert_ne!(load_key_file(&path).unwrap().as_bytes(), expected.as_bytes());
    }
}
