use crate::config::RedpandaConfig;
use crate::error::{AppError, PublishError};
use crate::message::OutboundMessage;
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

pub type RedpandaProducer = FutureProducer;

/// Broker confirmation for one delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Encode `message` and hand it to the broker under `topic`.
    /// Failures are returned, never retried.
    async fn publish(&self, message: &OutboundMessage, topic: &str) -> Result<Ack, PublishError>;
}

pub fn create_producer(config: &RedpandaConfig) -> Result<RedpandaProducer, AppError> {
    let client_id = format!("wx-relay-{}", Uuid::new_v4());
    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .set("client.id", &client_id)
        .set(
            "message.timeout.ms",
            config.message_timeout.as_millis().to_string(),
        )
        .set("queue.buffering.max.messages", "100000")
        .set("queue.buffering.max.kbytes", "1048576")
        .set("batch.num.messages", "10000")
        .create()
        .map_err(|e| AppError::Kafka(format!("Failed to create producer: {}", e)))?;

    Ok(producer)
}

/// Topic administration. Creating a topic that already exists succeeds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    async fn create_topic(&self, topic: &str) -> Result<(), String>;
}

pub struct KafkaTopicAdmin {
    admin: AdminClient<DefaultClientContext>,
    timeout: Duration,
}

impl KafkaTopicAdmin {
    pub fn new(config: &RedpandaConfig) -> Result<Self, AppError> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .create()
            .map_err(|e| AppError::Kafka(format!("Failed to create admin client: {}", e)))?;
        Ok(Self {
            admin,
            timeout: config.message_timeout,
        })
    }
}

#[async_trait]
impl TopicAdmin for KafkaTopicAdmin {
    async fn create_topic(&self, topic: &str) -> Result<(), String> {
        let new_topic = NewTopic::new(topic, 1, TopicReplication::Fixed(1));
        let opts = AdminOptions::new().operation_timeout(Some(self.timeout));
        let results = self
            .admin
            .create_topics([&new_topic], &opts)
            .await
            .map_err(|e| e.to_string())?;

        for result in results {
            match result {
                Ok(topic) => info!(topic = %topic, "created topic"),
                Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!(topic = %topic, "topic already exists")
                }
                Err((_, code)) => return Err(code.to_string()),
            }
        }
        Ok(())
    }
}

/// True when a send failed because the broker does not know the topic.
fn is_missing_topic(error: &KafkaError) -> bool {
    matches!(
        error,
        KafkaError::MessageProduction(
            RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::UnknownTopic
        )
    )
}

pub struct RedpandaPublisher {
    producer: RedpandaProducer,
    admin: Arc<dyn TopicAdmin>,
    provisioned: Mutex<HashSet<String>>,
    timeout: Duration,
    debug: bool,
}

impl RedpandaPublisher {
    pub fn new(
        producer: RedpandaProducer,
        admin: Arc<dyn TopicAdmin>,
        config: &RedpandaConfig,
        debug: bool,
    ) -> Self {
        Self {
            producer,
            admin,
            provisioned: Mutex::new(HashSet::new()),
            timeout: config.message_timeout,
            debug,
        }
    }

    /// Create `topics` ahead of the first publish. A topic that cannot be
    /// created now is retried the first time a write finds it missing.
    pub async fn ensure_topics(&self, topics: &[&str]) {
        for topic in topics {
            self.provision(topic).await;
        }
    }

    pub fn is_provisioned(&self, topic: &str) -> bool {
        self.provisioned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(topic)
    }

    async fn provision(&self, topic: &str) -> bool {
        match self.admin.create_topic(topic).await {
            Ok(()) => {
                self.provisioned
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(topic.to_string());
                true
            }
            Err(e) => {
                warn!(topic = topic, error = %e, "could not create topic");
                false
            }
        }
    }

    /// After a failed send, create the topic if the broker reported it
    /// missing and it has not been created by this publisher yet. The failed
    /// message itself is not resent.
    async fn recover_missing_topic(&self, topic: &str, error: &KafkaError) {
        if is_missing_topic(error) && !self.is_provisioned(topic) {
            info!(topic = topic, "topic missing on write; creating it");
            self.provision(topic).await;
        }
    }

    fn record_delivery(&self, topic: &str, payload: &[u8], partition: i32, offset: i64) {
        if self.debug {
            info!(
                topic = topic,
                payload = %String::from_utf8_lossy(payload),
                "message sent"
            );
        } else {
            trace!(topic = topic, partition, offset, "message published");
        }
    }
}

#[async_trait]
impl MessagePublisher for RedpandaPublisher {
    async fn publish(&self, message: &OutboundMessage, topic: &str) -> Result<Ack, PublishError> {
        let payload = message.encode()?;
        let record = FutureRecord::<(), [u8]>::to(topic).payload(&payload);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                self.record_delivery(topic, &payload, partition, offset);
                Ok(Ack {
                    topic: topic.to_string(),
                    partition,
                    offset,
                })
            }
            Err((e, _message)) => {
                self.recover_missing_topic(topic, &e).await;
                Err(PublishError::BrokerWrite(e.to_string()))
            }
        }
    }
}
