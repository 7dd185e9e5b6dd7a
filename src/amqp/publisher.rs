//! AMQP notification gateway
//!
//! Publishes each notification as a JSON envelope to a topic exchange, with
//! the notification kind as routing key.

use crate::amqp::messages::{ClubNotification, MessageEnvelope};
use crate::error::{MatchmakingError, Result};
use crate::notify::{NotificationGateway, NotificationKind};
use crate::types::ClubId;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for notification publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange_name: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange_name: crate::amqp::messages::NOTIFICATIONS_EXCHANGE.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

impl From<&crate::config::AmqpSettings> for PublisherConfig {
    fn from(settings: &crate::config::AmqpSettings) -> Self {
        Self {
            exchange_name: settings.exchange_name.clone(),
            max_retries: settings.max_retry_attempts,
            retry_delay_ms: settings.retry_delay_ms,
        }
    }
}

/// Notification gateway backed by an AMQP topic exchange
pub struct AmqpNotificationGateway {
    channel: Channel,
    config: PublisherConfig,
}

impl AmqpNotificationGateway {
    /// Create the gateway and declare its exchange
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let gateway = Self { channel, config };
        gateway.setup_exchange().await?;
        Ok(gateway)
    }

    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.config.exchange_name, "topic");
        self.channel
            .exchange_declare(args)
            .await
            .map_err(|e| MatchmakingError::InternalError {
                message: format!(
                    "Failed to declare exchange {}: {}",
                    self.config.exchange_name, e
                ),
            })?;

        info!("Declared AMQP exchange {}", self.config.exchange_name);
        Ok(())
    }

    /// Publish with retry and exponential backoff
    async fn publish(&self, envelope: &MessageEnvelope<ClubNotification>) -> Result<()> {
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(()) => {
                    debug!(
                        "Published message {} with key {}",
                        envelope.correlation_id, envelope.routing_key
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish message {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    /// Single publish attempt
    async fn try_publish(&self, envelope: &MessageEnvelope<ClubNotification>) -> Result<()> {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.config.exchange_name, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| MatchmakingError::InternalError {
                message: format!("Failed to publish message: {}", e),
            })
    }
}

#[async_trait]
impl NotificationGateway for AmqpNotificationGateway {
    async fn notify(
        &self,
        club_id: ClubId,
        kind: NotificationKind,
        payload: HashMap<String, String>,
    ) -> Result<()> {
        let envelope = MessageEnvelope::new(
            ClubNotification {
                club_id,
                kind,
                payload,
            },
            kind.as_str(),
        );
        self.publish(&envelope).await
    }
}
