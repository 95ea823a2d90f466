use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const STORAGE_BACKEND_ENV: &str = "SNIP_STORAGE_BACKEND";
pub const FILE_STORAGE_PATH_ENV: &str = "SNIP_FILE_STORAGE_PATH";
pub const MYSQL_DSN_ENV: &str = "SNIP_MYSQL_DSN";
pub const BASE_URL_ENV: &str = "SNIP_BASE_URL";
pub const LOG_FORMAT_ENV: &str = "SNIP_LOG_FORMAT";

pub const DEFAULT_FILE_STORAGE_PATH: &str = "short-url-db.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "file")]
    File,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "snip", about = "Shorten, resolve and delete URLs")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::File
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = FILE_STORAGE_PATH_ENV, default_value = DEFAULT_FILE_STORAGE_PATH)]
    pub file_storage_path: PathBuf,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = BASE_URL_ENV, default_value = snip_shortener::service::DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,

    /// Identity the command acts on behalf of.
    #[arg(long, global = true, default_value = "anonymous")]
    pub user: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one URL.
    Shorten { url: String },
    /// Shorten a JSON array of `{"correlation_id", "original_url"}` objects
    /// read from a file, or from stdin when no file is given.
    Batch { input: Option<PathBuf> },
    /// Print the original URL behind a short code.
    Resolve { code: String },
    /// List the caller's live short URLs.
    List,
    /// Delete some of the caller's short codes.
    Delete {
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Check that the storage backend is reachable.
    Ping,
}
