//! Connection manager, publisher and queue subscription.
//!
//! An [`AmqpClient`] owns exactly one broker connection and one channel,
//! bound to one exchange. Establishment retries on the client's
//! [`RetryPolicy`] and, after exhaustion, leaves the client in a non-live
//! state instead of raising. Every use site checks [`AmqpClient::is_alive`]
//! lazily; there is no background health check.
//!
//! Publishing is fire-and-forget: the event is stamped with a timestamp,
//! serialized and sent. A dropped stream mid-send triggers one reconnect and
//! one retry, driven by an explicit loop rather than recursion; any other
//! failure is logged and reported, never raised.

use crate::config::{AckPolicy, BrokerConfig};
use crate::error::BrokerError;
use crate::retry::{retry_with_backoff, RetryPolicy};
use chrono::{DateTime, Utc};
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use serde::Serialize;
use shelfsync_core::publisher::{EventPublisher, PublishError};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Reply code sent with graceful channel/connection closes.
const CLOSE_OK: u16 = 200;

/// Whether a lapin error means the underlying stream/connection is gone, as
/// opposed to a protocol-level rejection of an otherwise healthy send.
fn is_connection_error(err: &lapin::Error) -> bool {
    matches!(
        err,
        lapin::Error::InvalidConnectionState(_)
            | lapin::Error::InvalidChannelState(_)
            | lapin::Error::IOError(_)
    )
}

/// Whether a failed send gets the reconnect-and-retry, given whether that
/// single-use budget was already spent on this publish.
fn should_retry_send(err: &lapin::Error, reconnected: bool) -> bool {
    is_connection_error(err) && !reconnected
}

/// Stamp the publish timestamp into an event body.
///
/// Every outbound envelope is a JSON object; non-objects are left untouched.
pub fn stamp_timestamp(body: &mut serde_json::Value, now: DateTime<Utc>) {
    if let serde_json::Value::Object(fields) = body {
        fields.insert(
            "timestamp".to_string(),
            serde_json::Value::String(now.to_rfc3339()),
        );
    }
}

/// One broker connection + channel, bound to one topic exchange.
pub struct AmqpClient {
    exchange: String,
    config: BrokerConfig,
    retry: RetryPolicy,
    connection: Option<Connection>,
    channel: Option<Channel>,
}

impl AmqpClient {
    /// Client for the given exchange. Does not connect; call
    /// [`AmqpClient::connect`].
    #[must_use]
    pub fn new(exchange: impl Into<String>, config: BrokerConfig) -> Self {
        Self {
            exchange: exchange.into(),
            config,
            retry: RetryPolicy::default(),
            connection: None,
            channel: None,
        }
    }

    /// Override the connection retry budget.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Exchange this client is bound to.
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Acknowledgement policy this client consumes with.
    #[must_use]
    pub const fn ack_policy(&self) -> AckPolicy {
        self.config.ack_policy
    }

    /// Three-part liveness check: connection present, channel present, and
    /// the connection reports open. Evaluated lazily at each use.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        match (&self.connection, &self.channel) {
            (Some(connection), Some(_)) => connection.status().connected(),
            _ => false,
        }
    }

    /// Establish the connection, create a channel and declare the topic
    /// exchange (durable; re-declaring an existing exchange is a no-op).
    ///
    /// Retries on the client's [`RetryPolicy`]. After the budget is
    /// exhausted this logs a critical failure and returns with the client
    /// non-live. It does not raise; callers must check
    /// [`AmqpClient::is_alive`] before use.
    pub async fn connect(&mut self) {
        match retry_with_backoff(&self.retry, || self.try_connect()).await {
            Ok((connection, channel)) => {
                self.connection = Some(connection);
                self.channel = Some(channel);
                info!(
                    exchange = %self.exchange,
                    "Successfully established a connection to the broker"
                );
            }
            Err(err) => {
                error!(
                    exchange = %self.exchange,
                    error = %err,
                    "Failed to establish broker connection after retries"
                );
            }
        }
    }

    async fn try_connect(&self) -> Result<(Connection, Channel), lapin::Error> {
        let connection =
            Connection::connect(&self.config.uri(), ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok((connection, channel))
    }

    /// Publish an event on a routing key.
    ///
    /// Serializes the event, stamps the publish timestamp into it, and
    /// delegates to [`AmqpClient::publish_value`].
    ///
    /// # Errors
    ///
    /// See [`AmqpClient::publish_value`].
    pub async fn publish<E: Serialize>(
        &mut self,
        event: &E,
        routing_key: &str,
    ) -> Result<(), PublishError> {
        let body = serde_json::to_value(event).map_err(|err| PublishError::Failed {
            routing_key: routing_key.to_string(),
            reason: err.to_string(),
        })?;
        self.publish_value(body, routing_key).await
    }

    /// Publish an already-serialized JSON event body on a routing key.
    ///
    /// The publish timestamp is stamped into the body just before each send
    /// attempt. On a dropped-stream error the stale connection is closed,
    /// re-established under the retry budget, and the publish retried exactly
    /// once. The originating domain mutation is never rolled back on failure.
    ///
    /// # Errors
    ///
    /// [`PublishError::NotConnected`] when the connection is not alive and
    /// [`PublishError::Failed`] when the send (or its single retry) fails.
    /// Never panics; callers log and absorb the error.
    pub async fn publish_value(
        &mut self,
        mut body: serde_json::Value,
        routing_key: &str,
    ) -> Result<(), PublishError> {
        let mut reconnected = false;
        loop {
            let Some(channel) = self.live_channel() else {
                error!(
                    routing_key,
                    "Failed to publish event: broker connection is not alive"
                );
                return Err(PublishError::NotConnected {
                    routing_key: routing_key.to_string(),
                });
            };

            stamp_timestamp(&mut body, Utc::now());
            match self.try_publish(&channel, &body, routing_key).await {
                Ok(()) => {
                    info!(routing_key, "Successfully published event");
                    return Ok(());
                }
                Err(err) if should_retry_send(&err, reconnected) => {
                    warn!(routing_key, error = %err, "Stream lost, reconnecting to broker");
                    self.close().await;
                    self.connect().await;
                    reconnected = true;
                }
                Err(err) => {
                    error!(routing_key, error = %err, "Failed to publish event");
                    return Err(PublishError::Failed {
                        routing_key: routing_key.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    fn live_channel(&self) -> Option<Channel> {
        if self.is_alive() {
            self.channel.clone()
        } else {
            None
        }
    }

    async fn try_publish(
        &self,
        channel: &Channel,
        body: &serde_json::Value,
        routing_key: &str,
    ) -> Result<(), lapin::Error> {
        let payload = serde_json::to_vec(body).unwrap_or_default();
        channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await?;
        Ok(())
    }

    /// Declare the queue for a routing key, bind it to the exchange and
    /// register a consumer on it.
    ///
    /// The queue is durable and namespaced as `<exchange>.<routing_key>` so
    /// that two exchanges using the same routing key string never collide on
    /// a queue name. The consumer auto-acks when the ack policy is
    /// [`AckPolicy::AckBeforeProcess`].
    ///
    /// # Errors
    ///
    /// [`BrokerError::NotConnected`] when the connection is not alive. On a
    /// connection-closed error during declare/bind the connection is
    /// re-established and [`BrokerError::SubscribeFailed`] returned for this
    /// call; the caller may re-invoke subscription setup.
    pub async fn subscribe(&mut self, routing_key: &str) -> Result<Consumer, BrokerError> {
        let Some(channel) = self.live_channel() else {
            error!(
                routing_key,
                "Failed to subscribe to queue: broker connection is not alive"
            );
            return Err(BrokerError::NotConnected {
                exchange: self.exchange.clone(),
            });
        };

        let queue = format!("{}.{}", self.exchange, routing_key);
        match self.try_subscribe(&channel, &queue, routing_key).await {
            Ok(consumer) => {
                info!(queue = %queue, routing_key, "Subscribed to queue");
                Ok(consumer)
            }
            Err(err) if is_connection_error(&err) => {
                error!(queue = %queue, error = %err, "Connection closed, reconnecting");
                self.close().await;
                self.connect().await;
                Err(BrokerError::SubscribeFailed {
                    queue,
                    reason: err.to_string(),
                })
            }
            Err(err) => {
                error!(queue = %queue, error = %err, "Failed to subscribe to queue");
                Err(BrokerError::SubscribeFailed {
                    queue,
                    reason: err.to_string(),
                })
            }
        }
    }

    async fn try_subscribe(
        &self,
        channel: &Channel,
        queue: &str,
        routing_key: &str,
    ) -> Result<Consumer, lapin::Error> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                queue,
                &self.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        channel
            .basic_consume(
                queue,
                &format!("{queue}.consumer"),
                BasicConsumeOptions {
                    no_ack: self.config.ack_policy == AckPolicy::AckBeforeProcess,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
    }

    /// Close the channel and connection gracefully, logging completion.
    /// A forcibly-terminated connection is absorbed silently.
    pub async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            match channel.close(CLOSE_OK, "shutting down").await {
                Ok(()) => info!(exchange = %self.exchange, "Broker channel closed"),
                Err(err) if is_connection_error(&err) => {
                    debug!(error = %err, "Channel was already gone on close");
                }
                Err(err) => {
                    error!(error = %err, "An error occurred while closing the broker channel");
                }
            }
        }

        if let Some(connection) = self.connection.take() {
            match connection.close(CLOSE_OK, "shutting down").await {
                Ok(()) => {
                    info!(exchange = %self.exchange, "Broker connection closed gracefully");
                }
                Err(err) if is_connection_error(&err) => {
                    debug!(error = %err, "Connection was already gone on close");
                }
                Err(err) => {
                    error!(error = %err, "An error occurred while closing the broker connection");
                }
            }
        }
    }
}

/// [`EventPublisher`] backed by a shared [`AmqpClient`].
///
/// The client sits behind a mutex because a publish may need to swap the
/// underlying connection (reconnect-and-retry); the outbound domain modules
/// only ever see the dyn-compatible trait.
#[derive(Clone)]
pub struct AmqpPublisher {
    client: Arc<Mutex<AmqpClient>>,
}

impl AmqpPublisher {
    /// Publisher over a shared client.
    #[must_use]
    pub fn new(client: Arc<Mutex<AmqpClient>>) -> Self {
        Self { client }
    }
}

impl EventPublisher for AmqpPublisher {
    fn publish(
        &self,
        routing_key: &str,
        event: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        let routing_key = routing_key.to_string();
        Box::pin(async move {
            let mut client = self.client.lock().await;
            client.publish_value(event, &routing_key).await
        })
    }
}
