use std::sync::Arc;
use std::time::Duration;

use deadpool_lapin::{Config as PoolConfig, Pool, Runtime};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Consumer};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Coarse-grained "advance this campaign" job, consumed by the Scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignTickJob {
    pub campaign_id: i32,
}

/// Fine-grained "deliver this EmailLog" job, consumed by the Sender.
/// `attempt` is the 1-based retry count, used to compute the next backoff
/// if this attempt also fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSendJob {
    pub email_log_id: i32,
    pub attempt: u32,
}

/// Exponential backoff base from §5: `2000ms * 2^(attempt-1)`.
pub fn retry_backoff(attempt: u32) -> Duration {
    let millis = 2000u64.saturating_mul(1u64 << attempt.saturating_sub(1).min(20));
    Duration::from_millis(millis)
}

/// Thin wrapper over two durable queues backed by RabbitMQ (via `lapin`),
/// supporting delayed enqueue through the `x-delay` header understood by
/// the `rabbitmq-delayed-message-exchange` plugin. There is no in-process
/// de-dup of publishes: the same `job_key` is legitimately republished
/// across a campaign's lifetime (a resumed or restarted campaign reuses
/// `tick:{campaign_id}`, an office-hours reschedule reuses the in-flight
/// `send:{id}:{attempt}`), so publish-side de-dup would drop real work.
/// The durable idempotency guarantee is the EmailLog's status, which every
/// consumer re-checks before acting (§4.6 step 2).
pub struct JobQueue {
    pool: Pool,
    tick_queue: String,
    send_queue: String,
}

impl JobQueue {
    pub async fn connect(uri: &str, tick_queue: String, send_queue: String) -> Result<Arc<Self>, EngineError> {
        let pool = PoolConfig {
            url: Some(uri.to_string()),
            ..Default::default()
        }
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| EngineError::Internal(format!("failed to build amqp pool: {e}")))?;

        let conn = pool.get().await?;
        let channel = conn.create_channel().await?;

        for queue in [&tick_queue, &send_queue] {
            channel
                .queue_declare(queue, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
                .await?;
        }

        Ok(Arc::new(Self {
            pool,
            tick_queue,
            send_queue,
        }))
    }

    async fn publish(&self, queue: &str, job_key: &str, payload: &[u8], delay: Duration) -> Result<(), EngineError> {
        let conn = self.pool.get().await?;
        let channel = conn.create_channel().await?;

        let mut headers = FieldTable::default();
        if !delay.is_zero() {
            headers.insert(
                ShortString::from("x-delay"),
                AMQPValue::LongInt(delay.as_millis() as i32),
            );
        }

        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_headers(headers)
                    .with_message_id(job_key.into()),
            )
            .await?
            .await?;

        Ok(())
    }

    pub async fn enqueue_tick(&self, campaign_id: i32, delay: Duration) -> Result<(), EngineError> {
        let job = CampaignTickJob { campaign_id };
        let payload = serde_json::to_vec(&job).map_err(|e| EngineError::Internal(e.to_string()))?;
        self.publish(&self.tick_queue, &format!("tick:{campaign_id}"), &payload, delay)
            .await
    }

    pub async fn enqueue_send(&self, email_log_id: i32, attempt: u32, delay: Duration) -> Result<(), EngineError> {
        let job = EmailSendJob { email_log_id, attempt };
        let payload = serde_json::to_vec(&job).map_err(|e| EngineError::Internal(e.to_string()))?;
        self.publish(
            &self.send_queue,
            &format!("send:{email_log_id}:{attempt}"),
            &payload,
            delay,
        )
        .await
    }

    pub async fn consume_ticks(&self, consumer_tag: &str) -> Result<Consumer, EngineError> {
        self.consume(&self.tick_queue, consumer_tag).await
    }

    pub async fn consume_sends(&self, consumer_tag: &str) -> Result<Consumer, EngineError> {
        self.consume(&self.send_queue, consumer_tag).await
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Consumer, EngineError> {
        let conn = self.pool.get().await?;
        let channel = conn.create_channel().await?;
        let consumer = channel
            .basic_consume(queue, consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
            .await?;
        Ok(consumer)
    }
}

/// Acknowledges a delivery after its handler completed successfully.
pub async fn ack(delivery: &lapin::message::Delivery) -> Result<(), EngineError> {
    delivery.ack(BasicAckOptions::default()).await.map_err(EngineError::from)
}

/// Negatively acknowledges a delivery. `requeue` is false for jobs the
/// handler has already rescheduled itself (via `enqueue_send`/`enqueue_tick`
/// with a fresh delay) to avoid duplicate in-flight copies.
pub async fn nack(delivery: &lapin::message::Delivery, requeue: bool) -> Result<(), EngineError> {
    delivery
        .nack(BasicNackOptions { requeue, ..Default::default() })
        .await
        .map_err(EngineError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(retry_backoff(1), Duration::from_millis(2000));
        assert_eq!(retry_backoff(2), Duration::from_millis(4000));
        assert_eq!(retry_backoff(3), Duration::from_millis(8000));
    }
}
