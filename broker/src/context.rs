//! Process-wide messaging context.
//!
//! One context is built explicitly at process start, holds at most one
//! [`AmqpClient`] per exchange for the process lifetime, and is torn down
//! explicitly on shutdown. Asking for an exchange that was never registered
//! is a clear [`BrokerError::NotInitialized`]; there is no implicit lazy
//! auto-create.

use crate::config::BrokerConfig;
use crate::connection::{AmqpClient, AmqpPublisher};
use crate::error::BrokerError;
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Explicit registry of broker clients, keyed by exchange name.
pub struct MessagingContext {
    clients: HashMap<String, Arc<Mutex<AmqpClient>>>,
}

impl MessagingContext {
    /// Start building a context.
    #[must_use]
    pub fn builder(config: BrokerConfig) -> MessagingContextBuilder {
        MessagingContextBuilder {
            config,
            retry: RetryPolicy::default(),
            exchanges: Vec::new(),
        }
    }

    /// The client for an exchange.
    ///
    /// # Errors
    ///
    /// [`BrokerError::NotInitialized`] when no client was registered for the
    /// exchange at build time.
    pub fn client(&self, exchange: &str) -> Result<Arc<Mutex<AmqpClient>>, BrokerError> {
        self.clients
            .get(exchange)
            .cloned()
            .ok_or_else(|| BrokerError::NotInitialized {
                exchange: exchange.to_string(),
            })
    }

    /// A publisher over the client for an exchange.
    ///
    /// # Errors
    ///
    /// [`BrokerError::NotInitialized`] when the exchange is unknown.
    pub fn publisher(&self, exchange: &str) -> Result<AmqpPublisher, BrokerError> {
        Ok(AmqpPublisher::new(self.client(exchange)?))
    }

    /// Connect every registered client. Establishment failures are absorbed
    /// per the retry policy; check each client's liveness before use.
    pub async fn connect_all(&self) {
        for (exchange, client) in &self.clients {
            info!(exchange = %exchange, "Initializing broker client");
            client.lock().await.connect().await;
        }
    }

    /// Close every registered client gracefully.
    pub async fn close_all(&self) {
        for client in self.clients.values() {
            client.lock().await.close().await;
        }
    }
}

/// Builder for a [`MessagingContext`].
pub struct MessagingContextBuilder {
    config: BrokerConfig,
    retry: RetryPolicy,
    exchanges: Vec<String>,
}

impl MessagingContextBuilder {
    /// Override the connection retry budget for every client.
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Register an exchange this process will publish on or consume from.
    #[must_use]
    pub fn exchange(mut self, name: impl Into<String>) -> Self {
        self.exchanges.push(name.into());
        self
    }

    /// Build the context. Clients are created but not yet connected; call
    /// [`MessagingContext::connect_all`].
    #[must_use]
    pub fn build(self) -> MessagingContext {
        let clients = self
            .exchanges
            .into_iter()
            .map(|exchange| {
                let client = AmqpClient::new(&exchange, self.config.clone())
                    .with_retry_policy(self.retry.clone());
                (exchange, Arc::new(Mutex::new(client)))
            })
            .collect();
        MessagingContext { clients }
    }
}
