use crate::{Result, TestInfraError};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const MYSQL_PORT: u16 = 3306;

#[derive(Debug, Clone, TypedBuilder)]
pub struct MysqlConfig {
    #[builder(default = "snip".to_string(), setter(into))]
    database: String,
    #[builder(default = "snip".to_string(), setter(into))]
    username: String,
    #[builder(default = "snip".to_string(), setter(into))]
    password: String,
    #[builder(default = "8.4".to_string(), setter(into))]
    tag: String,
    /// Connection attempts made by [`MySqlServer::connect`] before giving up.
    #[builder(default = 20)]
    connect_attempts: usize,
    #[builder(default = Duration::from_millis(500))]
    connect_backoff: Duration,
}

/// Test fixture for a disposable MySQL server.
///
/// The container is removed when the fixture is dropped.
pub struct MySqlServer {
    container: ContainerAsync<GenericImage>,
    config: MysqlConfig,
}

impl MySqlServer {
    /// Starts a MySQL container with the default test credentials.
    pub async fn start() -> Result<Self> {
        Self::new(MysqlConfig::builder().build()).await
    }

    /// Starts a MySQL container suitable for integration tests.
    pub async fn new(config: MysqlConfig) -> Result<Self> {
        let container = GenericImage::new("mysql", config.tag.as_str())
            .with_exposed_port(MYSQL_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr("ready for connections"))
            .with_env_var("MYSQL_DATABASE", config.database.as_str())
            .with_env_var("MYSQL_USER", config.username.as_str())
            .with_env_var("MYSQL_PASSWORD", config.password.as_str())
            .with_env_var("MYSQL_ROOT_PASSWORD", "root")
            .start()
            .await?;

        Ok(Self { container, config })
    }

    pub async fn database_url(&self) -> Result<String> {
        let host = self.container.get_host().await?;
        let port = self.container.get_host_port_ipv4(MYSQL_PORT).await?;
        Ok(format!(
            "mysql://{}:{}@{}:{}/{}",
            self.config.username, self.config.password, host, port, self.config.database
        ))
    }

    /// Opens a pool to the server.
    ///
    /// MySQL logs "ready for connections" once for its temporary init server
    /// before the real one is up, so the first attempts may be refused.
    pub async fn connect(&self, max_connections: u32) -> Result<MySqlPool> {
        let url = self.database_url().await?;
        let mut last_error = None;

        for _ in 0..self.config.connect_attempts.max(1) {
            match MySqlPoolOptions::new()
                .max_connections(max_connections)
                .connect(&url)
                .await
            {
                Ok(pool) => return Ok(pool),
                Err(err) => {
                    last_error = Some(err);
                    tokio::time::sleep(self.config.connect_backoff).await;
                }
            }
        }

        Err(TestInfraError::Connect(
            last_error.map(|err| err.to_string()).unwrap_or_default(),
        ))
    }
}
