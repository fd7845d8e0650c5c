//! Server settings, from flags or the environment

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use keeper_core::Paths;

#[derive(Parser, Debug)]
#[command(name = "keeper-server")]
#[command(about = "keeper server - stores encrypted records for registered users")]
#[command(version)]
#[command(after_help = r#"ENVIRONMENT:
    KEEPER_STORE_FILE   Database file (default ~/.local/share/keeper/server_store.db)
    KEEPER_PORT         Listen port
    KEEPER_BIND         Listen address
    RUST_LOG            Log filter, e.g. info or keeper_server=debug

The server speaks plain HTTP. Put it behind a TLS-terminating proxy."#)]
pub struct ServerArgs {
    /// SQLite database holding users and records
    #[arg(long, env = "KEEPER_STORE_FILE")]
    pub store_file: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "KEEPER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to listen on
    #[arg(long, env = "KEEPER_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,
}

impl ServerArgs {
    pub fn store_path(&self) -> PathBuf {
        self.store_file
            .clone()
            .unwrap_or_else(|| Paths::new().server_db())
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
