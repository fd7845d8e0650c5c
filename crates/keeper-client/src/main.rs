//! keeper - personal secret manager client
//!
//! Records are encrypted on this machine before they are sent to the server.
//! A local cache answers reads while the server is unreachable.
//!
//! Commands:
//! - user verify|register|password: Manage the account on the server
//! - cache sync|clean: Fill or empty the offline cache
//! - list: List all records
//! - acc|note|card|bin <ACTION>: Work with one kind of record

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use keeper_client::config::MIN_PASSWORD_LEN;
use keeper_client::{load_key_file, ClientConfig, HttpRemote, RecordRef, SyncClient, Vault};
use keeper_core::{format_records, Account, Binary, Card, Note, Payload};
use record_store::{RecordStore, StoreMode};

#[derive(Parser)]
#[command(name = "keeper")]
#[command(about = "Personal secret manager - accounts, notes, cards and files, encrypted on the client")]
#[command(version)]
#[command(after_help = r#"EXAMPLES:
    keeper user register
    keeper acc store -n email -l mail.example.com -u alice -p hunter22
    keeper acc get -n email
    keeper card update -i 7 --cvc 123
    keeper bin store -n photo -f ./photo.jpg
    keeper bin get -n photo -f ./restored.jpg

CONFIGURATION:
    ~/.config/keeper/client.yaml (or $KEEPER_CONFIG), mode 600:
      user_name, password, full_name, server_address,
      cache_file, key_phrase_file, https_insecure, timeout_ms

SECURITY:
    - The record key is derived from key_phrase_file (mode 600, >= 10 bytes)
    - One trailing newline in key_phrase_file is not part of the phrase
    - Record names and types are visible to the server, contents are not
    - Losing the key phrase makes stored records unreadable"#)]
struct Cli {
    /// Client configuration file
    #[arg(long, global = true, env = "KEEPER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the account on the server
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Fill or empty the local offline cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// List all records (names and types only)
    List,

    /// Login credentials
    Acc {
        #[arg(value_enum)]
        action: Action,
        #[command(flatten)]
        select: Select,
        #[command(flatten)]
        fields: AccountArgs,
    },

    /// Free-form text notes
    Note {
        #[arg(value_enum)]
        action: Action,
        #[command(flatten)]
        select: Select,
        #[command(flatten)]
        fields: NoteArgs,
    },

    /// Payment cards
    Card {
        #[arg(value_enum)]
        action: Action,
        #[command(flatten)]
        select: Select,
        #[command(flatten)]
        fields: CardArgs,
    },

    /// Files
    Bin {
        #[arg(value_enum)]
        action: Action,
        #[command(flatten)]
        select: Select,
        #[command(flatten)]
        fields: BinaryArgs,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Check that the server accepts the configured credentials
    Verify,

    /// Create the configured user on the server
    Register,

    /// Change the account password (prompts if --new is omitted)
    Password {
        #[arg(long)]
        new: Option<String>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Copy every record from the server into the cache
    Sync,

    /// Remove every cached record
    Clean,
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    List,
    Store,
    Get,
    Update,
    Delete,
}

/// Record selection shared by every record kind
#[derive(Args)]
struct Select {
    /// Record name (the new name when updating by id)
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Record id
    #[arg(short = 'i', long)]
    id: Option<i64>,

    /// Free-form annotation, encrypted like the record
    #[arg(short = 'm', long)]
    meta: Option<String>,
}

impl Select {
    fn target(&self) -> Result<RecordRef> {
        match (self.id, &self.name) {
            (Some(id), _) => Ok(RecordRef::Id(id)),
            (None, Some(name)) => Ok(RecordRef::Name(name.clone())),
            (None, None) => bail!("either a record id (-i) or a name (-n) is required"),
        }
    }
}

/// Command-line fields of one payload type
trait PayloadArgs {
    type Payload: Payload + Default;

    /// Overwrite the payload fields given on the command line
    fn apply(&self, payload: &mut Self::Payload) -> Result<()>;

    /// Hand a fetched payload to the user beyond the printed record
    fn deliver(&self, _payload: &Self::Payload) -> Result<()> {
        Ok(())
    }
}

#[derive(Args)]
struct AccountArgs {
    /// Login name
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Login password
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Where the account is used
    #[arg(short = 'l', long)]
    url: Option<String>,
}

impl PayloadArgs for AccountArgs {
    type Payload = Account;

    fn apply(&self, account: &mut Account) -> Result<()> {
        set(&mut account.user_name, &self.user);
        set(&mut account.password, &self.password);
        set(&mut account.url, &self.url);
        Ok(())
    }
}

#[derive(Args)]
struct NoteArgs {
    /// Note text
    #[arg(short = 't', long)]
    text: Option<String>,
}

impl PayloadArgs for NoteArgs {
    type Payload = Note;

    fn apply(&self, note: &mut Note) -> Result<()> {
        set(&mut note.text, &self.text);
        Ok(())
    }
}

#[derive(Args)]
struct CardArgs {
    /// Card holder as printed on the card
    #[arg(long)]
    holder: Option<String>,

    /// Card number
    #[arg(long)]
    number: Option<String>,

    /// Expiry month (1-12)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    exp_month: Option<u32>,

    /// Expiry year
    #[arg(long)]
    exp_year: Option<u32>,

    /// Security code
    #[arg(long)]
    cvc: Option<String>,
}

impl PayloadArgs for CardArgs {
    type Payload = Card;

    fn apply(&self, card: &mut Card) -> Result<()> {
        set(&mut card.holder, &self.holder);
        set(&mut card.number, &self.number);
        set(&mut card.cvc, &self.cvc);
        if let Some(month) = self.exp_month {
            card.exp_month = month;
        }
        if let Some(year) = self.exp_year {
            card.exp_year = year;
        }
        Ok(())
    }
}

#[derive(Args)]
struct BinaryArgs {
    /// File to read when storing, or to write when getting
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,
}

impl PayloadArgs for BinaryArgs {
    type Payload = Binary;

    fn apply(&self, binary: &mut Binary) -> Result<()> {
        match &self.file {
            Some(path) => {
                let bytes =
                    fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
                binary.data = STANDARD.encode(bytes);
            }
            None if binary.data.is_empty() => bail!("a file (-f) is required"),
            None => {}
        }
        Ok(())
    }

    fn deliver(&self, binary: &Binary) -> Result<()> {
        let Some(path) = &self.file else {
            println!("info: Use -f <FILE> to save the contents");
            return Ok(());
        };

        let bytes = STANDARD
            .decode(&binary.data)
            .context("Stored file contents are not valid base64")?;
        write_private(path, &bytes)?;

        println!("success: Wrote {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }
}

fn set(field: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        *field = value.clone();
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(ClientConfig::default_path);
    let config = ClientConfig::load_from(&config_path)?;

    match cli.command {
        Commands::User { action } => cmd_user(config, &config_path, action),
        Commands::Cache { action } => cmd_cache(&config, action),
        Commands::List => cmd_list(&config),
        Commands::Acc {
            action,
            select,
            fields,
        } => cmd_records(&config, action, &select, &fields),
        Commands::Note {
            action,
            select,
            fields,
        } => cmd_records(&config, action, &select, &fields),
        Commands::Card {
            action,
            select,
            fields,
        } => cmd_records(&config, action, &select, &fields),
        Commands::Bin {
            action,
            select,
            fields,
        } => cmd_records(&config, action, &select, &fields),
    }
}

fn open_client(config: &ClientConfig) -> Result<SyncClient<HttpRemote>> {
    let remote = HttpRemote::new(
        &config.server_address,
        &config.user_name,
        &config.password,
        config.timeout(),
        config.https_insecure,
    )?;

    let cache = match config.cache_path() {
        Some(path) => Some(
            RecordStore::open(&path, StoreMode::Cache)
                .with_context(|| format!("Failed to open cache {:?}", path))?,
        ),
        None => None,
    };

    Ok(SyncClient::new(remote, cache, &config.user_name))
}

fn open_vault(config: &ClientConfig) -> Result<Vault<HttpRemote>> {
    // no key, no access
    let key = load_key_file(&config.key_phrase_file)?;
    Ok(Vault::new(open_client(config)?, key))
}

/// Account management
fn cmd_user(mut config: ClientConfig, config_path: &Path, action: UserAction) -> Result<()> {
    let client = open_client(&config)?;

    match action {
        UserAction::Verify => {
            let status = client.verify()?;
            println!("success: {}", status);
        }
        UserAction::Register => {
            check_password(&config.password)?;
            let id = client.register(&config.full_name, &config.password)?;
            println!("success: Registered user {} (id {})", config.user_name, id);
        }
        UserAction::Password { new } => {
            let new_password = match new {
                Some(p) => p,
                None => prompt_new_password()?,
            };
            check_password(&new_password)?;

            client.change_password(&new_password)?;

            config.password = new_password;
            config
                .save_to(config_path)
                .context("Password changed on the server but the config was not updated")?;
            println!("success: Password changed");
        }
    }
    Ok(())
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        );
    }
    Ok(())
}

fn prompt_new_password() -> Result<String> {
    let first =
        rpassword::prompt_password("New password: ").context("Failed to read password")?;
    let second =
        rpassword::prompt_password("Repeat password: ").context("Failed to read password")?;
    if first != second {
        bail!("passwords do not match");
    }
    Ok(first)
}

/// Cache maintenance
fn cmd_cache(config: &ClientConfig, action: CacheAction) -> Result<()> {
    let client = open_client(config)?;
    if client.cache().is_none() {
        bail!("no cache configured (cache_file is empty)");
    }

    match action {
        CacheAction::Sync => {
            let count = client.sync_all()?;
            println!("success: Cached {} records", count);
        }
        CacheAction::Clean => {
            let count = client.clean_cache()?;
            println!("success: Removed {} cached records", count);
        }
    }
    Ok(())
}

/// List records of every type
fn cmd_list(config: &ClientConfig) -> Result<()> {
    let vault = open_vault(config)?;
    print_listing(&vault.list_all()?, "records");
    Ok(())
}

fn print_listing(records: &keeper_core::Records, what: &str) {
    if records.is_empty() {
        println!("info: No {} found", what);
    } else {
        println!("{}", format_records(records));
    }
}

/// One action on one kind of record
fn cmd_records<A: PayloadArgs>(
    config: &ClientConfig,
    action: Action,
    select: &Select,
    fields: &A,
) -> Result<()> {
    let vault = open_vault(config)?;
    let record_type = <A::Payload as Payload>::RECORD_TYPE;

    match action {
        Action::List => {
            print_listing(&vault.list(record_type)?, &format!("{} records", record_type));
        }
        Action::Store => {
            let name = select
                .name
                .as_deref()
                .context("a record name (-n) is required")?;

            let mut payload = A::Payload::default();
            fields.apply(&mut payload)?;

            let id = vault.store(name, &payload, select.meta.as_deref().unwrap_or(""))?;
            println!("success: Stored {} record {} (id {})", record_type, name, id);
        }
        Action::Get => {
            let (id, record) = vault.get(record_type, &select.target()?)?;
            println!("Id: {}{}", id, record);
            fields.deliver(&A::Payload::unpack(&record.opaque)?)?;
        }
        Action::Update => {
            let target = select.target()?;
            let (id, current) = vault.get(record_type, &target)?;

            let mut payload = A::Payload::unpack(&current.opaque)?;
            fields.apply(&mut payload)?;

            // -n renames only when the record is addressed by id
            let name = match target {
                RecordRef::Id(_) => select.name.clone().unwrap_or(current.name),
                RecordRef::Name(_) => current.name,
            };
            let meta = select.meta.clone().unwrap_or(current.meta);

            vault.update(id, &name, &payload, &meta)?;
            println!("success: Updated {} record {} (id {})", record_type, name, id);
        }
        Action::Delete => {
            let id = vault.delete(record_type, &select.target()?)?;
            println!("success: Deleted {} record {}", record_type, id);
        }
    }
    Ok(())
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    file.write_all(bytes)?;
    Ok(())
}
