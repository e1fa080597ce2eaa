use crate::config::RedpandaConfig;
use crate::error::AppError;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use std::time::Duration;
use tracing::{debug, error};

pub type RedpandaConsumer = StreamConsumer;

fn consumer_config(cfg: &RedpandaConfig) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", &cfg.brokers);
    config.set("group.id", &cfg.group_id);
    config.set("auto.offset.reset", &cfg.auto_offset_reset);
    config.set("enable.partition.eof", "false");
    config.set("session.timeout.ms", "30000");
    config.set("enable.auto.commit", "true");
    config.set("auto.commit.interval.ms", "5000");
    config
}

/// Create a consumer already subscribed to the notification topic.
pub fn create_consumer(cfg: &RedpandaConfig) -> Result<RedpandaConsumer, AppError> {
    let consumer: StreamConsumer = consumer_config(cfg)
        .create()
        .map_err(|e| AppError::Kafka(format!("Failed to create consumer: {}", e)))?;

    consumer
        .subscribe(&[cfg.topic.as_str()])
        .map_err(|e| AppError::Kafka(format!("Failed to subscribe to {}: {}", cfg.topic, e)))?;
    debug!(topic = %cfg.topic, "subscribed to topic");

    Ok(consumer)
}

/// A change notification. The payload is optional; an empty one is
/// still delivered so the listener can decide to skip it.
#[derive(Debug, Clone)]
pub struct Notification {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

/// Wait up to one second for the next notification.
pub async fn receive_notification(
    consumer: &RedpandaConsumer,
) -> Result<Option<Notification>, AppError> {
    match tokio::time::timeout(Duration::from_secs(1), consumer.recv()).await {
        Ok(Ok(message)) => {
            let notification = Notification {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                payload: message.payload().map(<[u8]>::to_vec),
            };
            debug!(
                topic = %notification.topic,
                partition = notification.partition,
                offset = notification.offset,
                payload_len = notification.payload.as_ref().map_or(0, Vec::len),
                "received notification"
            );
            Ok(Some(notification))
        }
        Ok(Err(e)) => {
            error!(error = %e, "error receiving message");
            Err(AppError::Kafka(format!("Consumer error: {}", e)))
        }
        // no message within the poll window
        Err(_) => Ok(None),
    }
}
