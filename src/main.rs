use anyhow::Result;
use futures_lite::StreamExt;
use inspector_worker::config::WorkerConfig;
use inspector_worker::probe::TestRequestClient;
use inspector_worker::worker::{QueuePublisher, Worker};
use inspector_worker::{BatchScheduler, ReqwestTransport, RequestExecutor};
use lapin::{options::*, types::FieldTable, Connection, ConnectionProperties};
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();
    dotenv::dotenv().ok();

    info!("🚀 Inspector worker starting...");

    let config = WorkerConfig::from_env();

    info!("📡 Connecting to RabbitMQ at {}", config.rabbitmq_url);

    // Connect to RabbitMQ
    let conn = Connection::connect(&config.rabbitmq_url, ConnectionProperties::default()).await?;
    let channel = conn.create_channel().await?;

    info!("✅ Connected to RabbitMQ successfully");

    // Declare queues
    for queue in [&config.commands_queue, &config.events_queue] {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
    }

    // Shared HTTP client for load tests and test requests
    let client = reqwest::Client::builder().build()?;
    let executor = RequestExecutor::new(Arc::new(ReqwestTransport::new(client.clone())));
    let worker = Worker::new(
        BatchScheduler::new(executor, config.target_base_url.clone()),
        TestRequestClient::new(client, config.target_base_url.clone()),
        Arc::new(QueuePublisher::new(channel.clone(), config.events_queue.clone())),
    );

    info!(
        "🎧 Waiting for commands on '{}', target {}",
        config.commands_queue, config.target_base_url
    );

    // Create consumer
    let mut consumer = channel
        .basic_consume(
            &config.commands_queue,
            "inspector_worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    // Process messages
    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!("❌ Consumer error: {}", e);
                continue;
            }
        };

        info!("📨 Received message: {}", String::from_utf8_lossy(&delivery.data));

        match worker.handle_payload(&delivery.data).await {
            Ok(_) => {
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    error!("❌ Failed to ack: {}", e);
                }
            }
            Err(e) => {
                error!("❌ Failed to parse message: {}", e);
                let nack = BasicNackOptions {
                    requeue: false,
                    ..Default::default()
                };
                if let Err(e) = delivery.nack(nack).await {
                    error!("❌ Failed to nack: {}", e);
                }
            }
        }
    }

    Ok(())
}
