//! Replication consumer binary.
//!
//! `shelfsync catalog` runs the catalog service's consumer against the
//! lending exchange; `shelfsync lending` runs the lending service's consumer
//! against the catalog exchange. Each process owns its own broker connection
//! and shuts down gracefully on SIGINT/SIGTERM.

use clap::{Parser, Subcommand};
use shelfsync_broker::{listen_for_signals, BrokerConfig, ConsumerLoop, MessagingContext, Shutdown};
use shelfsync_catalog::CatalogReplica;
use shelfsync_lending::LendingReplica;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shelfsync", about = "Library replication consumers", version)]
struct Cli {
    #[command(subcommand)]
    service: Service,
}

#[derive(Subcommand)]
enum Service {
    /// Consume lending-exchange events into the catalog service's replicas.
    Catalog,
    /// Consume catalog-exchange events into the lending service's replicas.
    Lending,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelfsync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = BrokerConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        ack_policy = %config.ack_policy,
        "Configuration loaded"
    );

    let table = match cli.service {
        Service::Catalog => {
            shelfsync_catalog::inbound_dispatch_table(Arc::new(CatalogReplica::new()))
        }
        Service::Lending => {
            shelfsync_lending::inbound_dispatch_table(Arc::new(LendingReplica::new()))
        }
    };

    let context = MessagingContext::builder(config)
        .exchange(table.exchange())
        .build();
    context.connect_all().await;

    let client = context.client(table.exchange())?;
    if !client.lock().await.is_alive() {
        println!("No active broker client found.");
        return Ok(());
    }

    let shutdown = Shutdown::new();
    tokio::spawn(listen_for_signals(shutdown.clone()));

    let consumer = ConsumerLoop::new(Arc::clone(&client), table, shutdown.subscribe()).await?;
    println!("[*] Starting consumer...");
    println!("[*] Terminate with CONTROL-C");
    consumer.run().await;

    context.close_all().await;
    info!("Consumer stopped");
    Ok(())
}
