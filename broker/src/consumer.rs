//! The consume loop.
//!
//! One [`ConsumerLoop`] drives all queue subscriptions for one exchange. It
//! merges the per-queue consumers into a single delivery stream and processes
//! messages strictly sequentially: one handler fully completes before the
//! next delivery is taken, so handlers never run concurrently and need no
//! internal locking.
//!
//! A closed connection is recovered transparently: the client reconnects
//! under its retry budget and the whole dispatch table is re-subscribed; if
//! re-establishment fails, the loop exits without consuming. Shutdown is
//! cooperative: a broadcast token checked between deliveries; on receipt the
//! loop closes the channel and connection gracefully and returns.

use crate::config::AckPolicy;
use crate::connection::AmqpClient;
use crate::dispatch::DispatchTable;
use crate::error::BrokerError;
use futures::stream::{self, StreamExt};
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

/// Blocking consumer for one exchange's bound queues.
pub struct ConsumerLoop {
    client: Arc<Mutex<AmqpClient>>,
    table: DispatchTable,
    ack_policy: AckPolicy,
    shutdown: broadcast::Receiver<()>,
}

impl ConsumerLoop {
    /// Wire a dispatch table to a client and a shutdown token.
    ///
    /// # Errors
    ///
    /// Configuration errors, raised immediately rather than at delivery
    /// time: [`BrokerError::EmptyDispatchTable`] for a table with no routes
    /// and [`BrokerError::ExchangeMismatch`] when the table and the client
    /// disagree about the exchange.
    pub async fn new(
        client: Arc<Mutex<AmqpClient>>,
        table: DispatchTable,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self, BrokerError> {
        table.validate()?;
        let ack_policy = {
            let locked = client.lock().await;
            if locked.exchange() != table.exchange() {
                return Err(BrokerError::ExchangeMismatch {
                    table: table.exchange().to_string(),
                    client: locked.exchange().to_string(),
                });
            }
            locked.ack_policy()
        };

        Ok(Self {
            client,
            table,
            ack_policy,
            shutdown,
        })
    }

    /// Consume until the connection is gone for good or shutdown is
    /// triggered.
    ///
    /// Binds every routing key in the dispatch table, then processes
    /// deliveries one at a time. Handler failures are logged and absorbed;
    /// they never kill the loop, and under [`AckPolicy::AckBeforeProcess`]
    /// the failed event is already acknowledged and therefore lost.
    pub async fn run(mut self) {
        info!(exchange = %self.table.exchange(), "Starting consumer loop");

        'session: loop {
            let consumers = self.bind_queues().await;
            if consumers.is_empty() {
                error!(
                    exchange = %self.table.exchange(),
                    "Cannot start consuming: no queue subscriptions established"
                );
                break;
            }

            let mut deliveries = stream::select_all(consumers);
            loop {
                tokio::select! {
                    _ = self.shutdown.recv() => {
                        info!("Shutting down consumer...");
                        self.client.lock().await.close().await;
                        return;
                    }
                    next = deliveries.next() => match next {
                        Some(Ok(delivery)) => self.dispatch(delivery).await,
                        Some(Err(err)) => {
                            error!(error = %err, "Connection to broker closed, reconnecting");
                            if self.reconnect().await {
                                continue 'session;
                            }
                            break 'session;
                        }
                        None => {
                            warn!("Delivery stream ended, reconnecting");
                            if self.reconnect().await {
                                continue 'session;
                            }
                            break 'session;
                        }
                    }
                }
            }
        }

        info!(exchange = %self.table.exchange(), "Consumer loop stopped");
    }

    /// Subscribe every routing key in the table. Individual failures are
    /// logged; the loop runs with whatever subset succeeded.
    async fn bind_queues(&self) -> Vec<lapin::Consumer> {
        let mut client = self.client.lock().await;
        let mut consumers = Vec::with_capacity(self.table.len());
        for routing_key in self.table.routing_keys() {
            match client.subscribe(routing_key).await {
                Ok(consumer) => consumers.push(consumer),
                Err(err) => {
                    error!(routing_key, error = %err, "Failed to subscribe to queue");
                }
            }
        }
        consumers
    }

    /// Re-establish the connection under the client's retry budget.
    /// Returns whether the loop can resume.
    async fn reconnect(&self) -> bool {
        let mut client = self.client.lock().await;
        client.close().await;
        client.connect().await;
        client.is_alive()
    }

    async fn dispatch(&self, delivery: Delivery) {
        let routing_key = delivery.routing_key.as_str().to_string();
        let Some(handler) = self.table.handler(&routing_key) else {
            warn!(routing_key, "No handler registered for routing key, dropping event");
            return;
        };

        let result = handler.handle(&delivery.data).await;
        if let Err(err) = &result {
            error!(routing_key, error = %err, "Failed to handle event");
        }

        // Under ack-before-process the broker already auto-acked at delivery
        // time; only ack-after-success involves the application.
        if self.ack_policy == AckPolicy::AckAfterSuccess {
            let outcome = match result {
                Ok(()) => delivery.ack(BasicAckOptions::default()).await,
                // Handler failures are terminal for the event under either
                // policy; requeueing a poison message would loop forever.
                Err(_) => {
                    delivery
                        .nack(BasicNackOptions {
                            requeue: false,
                            ..BasicNackOptions::default()
                        })
                        .await
                }
            };
            if let Err(err) = outcome {
                warn!(routing_key, error = %err, "Failed to settle delivery");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use crate::dispatch::{EventHandler, HandlerError};
    use std::future::Future;
    use std::pin::Pin;

    struct NoopHandler;

    impl EventHandler for NoopHandler {
        fn handle<'a>(
            &'a self,
            _body: &'a [u8],
        ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn shared_client(exchange: &str) -> Arc<Mutex<AmqpClient>> {
        Arc::new(Mutex::new(AmqpClient::new(
            exchange,
            BrokerConfig::default(),
        )))
    }

    #[tokio::test]
    async fn empty_table_fails_construction() {
        let (_tx, rx) = broadcast::channel(1);
        let result =
            ConsumerLoop::new(shared_client("catalog"), DispatchTable::new("catalog"), rx).await;

        assert!(matches!(
            result,
            Err(BrokerError::EmptyDispatchTable { .. })
        ));
    }

    #[tokio::test]
    async fn exchange_mismatch_fails_construction() {
        let (_tx, rx) = broadcast::channel(1);
        let table = DispatchTable::new("lending").route("user.created", Arc::new(NoopHandler));

        let result = ConsumerLoop::new(shared_client("catalog"), table, rx).await;

        assert!(matches!(result, Err(BrokerError::ExchangeMismatch { .. })));
    }

    #[tokio::test]
    async fn loop_exits_when_no_subscription_can_be_established() {
        // Never-connected client: every subscribe fails fast, so the loop
        // must return instead of spinning.
        let (_tx, rx) = broadcast::channel(1);
        let table = DispatchTable::new("catalog").route("book.created", Arc::new(NoopHandler));
        let consumer = ConsumerLoop::new(shared_client("catalog"), table, rx)
            .await
            .map_err(|e| e.to_string());

        match consumer {
            Ok(consumer) => consumer.run().await,
            Err(e) => panic!("construction should succeed: {e}"),
        }
    }
}
