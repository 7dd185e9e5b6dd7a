//! AMQP connection management with retry logic

use crate::config::AmqpSettings;
use amqprs::channel::Channel;
use amqprs::connection::{Connection, OpenConnectionArguments};
use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Upper bound for the backoff between connection attempts
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Wrapper around AMQP connection with additional metadata
pub struct AmqpConnection {
    connection: Connection,
    settings: AmqpSettings,
}

impl AmqpConnection {
    /// Create a new AMQP connection with retry logic
    pub async fn new(settings: AmqpSettings) -> Result<Self> {
        let connection = Self::connect_with_retry(&settings).await?;

        Ok(Self {
            connection,
            settings,
        })
    }

    /// Attempt to connect with exponential backoff retry
    async fn connect_with_retry(settings: &AmqpSettings) -> Result<Connection> {
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(settings.retry_delay_ms);

        loop {
            match Self::try_connect(settings).await {
                Ok(connection) => {
                    info!(
                        "Connected to AMQP broker at {}:{}",
                        settings.host, settings.port
                    );
                    return Ok(connection);
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > settings.max_retry_attempts {
                        error!(
                            "Failed to connect to AMQP after {} retries",
                            settings.max_retry_attempts
                        );
                        return Err(anyhow!("Max AMQP connection retries exceeded: {}", e));
                    }

                    warn!(
                        "AMQP connection attempt {} failed: {}. Retrying in {:?}",
                        retry_count, e, delay
                    );

                    sleep(delay).await;
                    delay = next_delay(delay);
                }
            }
        }
    }

    /// Single connection attempt
    async fn try_connect(settings: &AmqpSettings) -> Result<Connection> {
        let mut args = OpenConnectionArguments::new(
            &settings.host,
            settings.port,
            &settings.username,
            &settings.password,
        );
        args.virtual_host(&settings.vhost);

        Connection::open(&args)
            .await
            .context("Failed to open AMQP connection")
    }

    /// Open a channel for publishing
    pub async fn open_channel(&self) -> Result<Channel> {
        self.connection
            .open_channel(None)
            .await
            .context("Failed to open AMQP channel")
    }

    pub fn settings(&self) -> &AmqpSettings {
        &self.settings
    }

    /// Check if connection is still open
    pub fn is_alive(&self) -> bool {
        self.connection.is_open()
    }

    /// Close the connection
    pub async fn close(self) -> Result<()> {
        self.connection
            .close()
            .await
            .context("Failed to close AMQP connection")
    }
}

/// Double the delay, capped
fn next_delay(delay: Duration) -> Duration {
    Duration::from_millis((delay.as_millis() as u64 * 2).min(MAX_RETRY_DELAY_MS))
}
