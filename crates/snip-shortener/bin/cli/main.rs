mod cli;

use crate::cli::{Command, LogFormatArg, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use snip_core::{Store, UserId};
use snip_generator::RandomGenerator;
use snip_shortener::{parse_short_code, BatchRequest, ServiceSettings, ShortenerService};
use snip_storage::{FileStore, InMemoryStore, MySqlSettings, MySqlStore};
use std::io::Read;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    info!(
        storage_backend = %config.storage,
        base_url = %config.base_url,
        "starting snip"
    );

    let settings = ServiceSettings::builder()
        .base_url(config.base_url.clone())
        .build();
    let user = UserId::new(config.user.clone());

    match config.storage {
        StorageBackendArg::InMemory => {
            let service =
                ShortenerService::new(InMemoryStore::new(), RandomGenerator::new(), settings);
            run(&service, &user, config.command).await
        }
        StorageBackendArg::File => {
            let store = FileStore::open(&config.file_storage_path)
                .await
                .with_context(|| {
                    format!("failed to open {}", config.file_storage_path.display())
                })?;
            let service = ShortenerService::new(store, RandomGenerator::new(), settings);
            let outcome = run(&service, &user, config.command).await;
            service.store().close().await?;
            outcome
        }
        StorageBackendArg::Mysql => {
            let dsn = config
                .mysql_dsn
                .context("mysql dsn is required when storage backend is mysql")?;
            let store = MySqlStore::connect(&MySqlSettings::builder().database_url(dsn).build())
                .await
                .context("failed to connect to mysql")?;
            store.migrate().await?;
            let service = ShortenerService::new(store, RandomGenerator::new(), settings);
            run(&service, &user, config.command).await
        }
    }
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}

/// Executes one command, then drains pending deletions.
async fn run<S: Store>(
    service: &ShortenerService<S, RandomGenerator>,
    user: &UserId,
    command: Command,
) -> anyhow::Result<()> {
    let outcome = execute(service, user, command).await;
    service.shutdown().await;
    outcome
}

async fn execute<S: Store>(
    service: &ShortenerService<S, RandomGenerator>,
    user: &UserId,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Shorten { url } => {
            let shortened = service.shorten(&url, user).await?;
            if shortened.was_duplicate {
                info!(code = %shortened.code, "url was already shortened");
            }
            println!("{}", service.short_url(&shortened.code));
        }
        Command::Batch { input } => {
            let raw = match input {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut raw = String::new();
                    std::io::stdin().read_to_string(&mut raw)?;
                    raw
                }
            };
            let requests: Vec<BatchRequest> =
                serde_json::from_str(&raw).context("invalid batch request")?;
            let responses = service.shorten_batch(requests, user).await?;
            println!("{}", serde_json::to_string_pretty(&responses)?);
        }
        Command::Resolve { code } => {
            let code = parse_short_code(&code)?;
            println!("{}", service.resolve(&code).await?);
        }
        Command::List => {
            for url in service.list_owned(user).await? {
                println!(
                    "{}\t{}",
                    service.short_url(&url.short_code),
                    url.original_url
                );
            }
        }
        Command::Delete { codes } => {
            let codes = codes
                .into_iter()
                .map(|code| parse_short_code(&code))
                .collect::<Result<Vec<_>, _>>()?;
            service.request_deletion(user, codes).await?;
        }
        Command::Ping => {
            service.ping().await?;
            println!("ok");
        }
    }
    Ok(())
}
