//! Standard paths used by keeper tools

use std::path::PathBuf;

/// Standard keeper paths
pub struct Paths {
    /// Data directory (~/.local/share/keeper)
    pub data: PathBuf,
    /// Config directory (~/.config/keeper)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("keeper");

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("keeper");

        Self { data, config }
    }

    /// Default client configuration file
    pub fn client_config(&self) -> PathBuf {
        self.config.join("client.yaml")
    }

    /// Default location of the client's offline cache
    pub fn cache_db(&self) -> PathBuf {
        self.data.join("cache.db")
    }

    /// Default location of the server's canonical store
    pub fn server_db(&self) -> PathBuf {
        self.data.join("server_store.db")
    }
}
