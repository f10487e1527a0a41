//! Inbound `cv.uploaded` consumption and the ack/nack contract.
//!
//! Terminal-event rules, per delivery:
//! - success: publish `cv.parsed`, then ack
//! - permanent failure: publish `cv.failed`, then ack
//! - transient failure with attempts remaining: nack with requeue, no event
//! - transient failure with the budget exhausted: publish `cv.failed`, then
//!   nack without requeue so the message dead-letters
//! - undeserializable payload: nack without requeue, no event (there is no
//!   identity to address an event to)

use std::sync::Arc;

use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::Channel;
use tracing::{error, info, warn};

use crate::bus::publisher::EventPublisher;
use crate::bus::topology::CV_PARSER_QUEUE;
use crate::error::{BusError, ErrorCode, JobError};
use crate::events::CvUploadedEvent;
use crate::pipeline::Pipeline;
use crate::worker::Job;

pub struct EventConsumer {
    channel: Channel,
    publisher: Arc<EventPublisher>,
    pipeline: Arc<Pipeline>,
    prefetch: u16,
    max_attempts: u32,
}

impl EventConsumer {
    pub fn new(
        channel: Channel,
        publisher: Arc<EventPublisher>,
        pipeline: Arc<Pipeline>,
        prefetch: u16,
        max_attempts: u32,
    ) -> Self {
        Self {
            channel,
            publisher,
            pipeline,
            prefetch,
            max_attempts,
        }
    }

    /// Consumes until the stream ends (connection loss) or the task is
    /// cancelled. Each delivery is processed on its own task so a slow job
    /// never blocks the stream, up to the prefetch window.
    pub async fn run(&self) -> Result<(), BusError> {
        self.channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await?;

        let mut consumer = self
            .channel
            .basic_consume(
                CV_PARSER_QUEUE,
                "cv-parser",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(queue = CV_PARSER_QUEUE, prefetch = self.prefetch, "consuming");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            let publisher = Arc::clone(&self.publisher);
            let pipeline = Arc::clone(&self.pipeline);
            let max_attempts = self.max_attempts;
            tokio::spawn(async move {
                handle_delivery(delivery, publisher, pipeline, max_attempts).await;
            });
        }

        warn!("delivery stream ended");
        Ok(())
    }
}

async fn handle_delivery(
    delivery: Delivery,
    publisher: Arc<EventPublisher>,
    pipeline: Arc<Pipeline>,
    max_attempts: u32,
) {
    let event: CvUploadedEvent = match serde_json::from_slice(&delivery.data) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "undeserializable payload, sending to DLQ");
            nack(&delivery, false).await;
            return;
        }
    };

    let attempt = attempt_count(delivery.properties.headers().as_ref(), delivery.redelivered);
    let job = Job::from_event(event, attempt);
    info!(
        application_id = %job.application_id,
        file_key = %job.file_key,
        attempt,
        "processing cv.uploaded"
    );

    let pipeline_job = job.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.run(&pipeline_job))
        .await
        .unwrap_or_else(|e| {
            Err(JobError::new(
                ErrorCode::Internal,
                true,
                format!("pipeline task panicked or was cancelled: {}", e),
            ))
        });

    match result {
        Ok(outcome) => match publisher.publish_parsed(&job, outcome).await {
            Ok(()) => ack(&delivery).await,
            Err(e) => {
                // Without a confirmed terminal event the job is not done;
                // redeliver rather than lose it.
                error!(application_id = %job.application_id, error = %e, "publish failed, requeueing");
                nack(&delivery, true).await;
            }
        },
        Err(job_error) if !job_error.retryable => {
            if let Err(e) = publisher.publish_failed(&job, &job_error).await {
                error!(application_id = %job.application_id, error = %e, "publish failed, requeueing");
                nack(&delivery, true).await;
                return;
            }
            ack(&delivery).await;
        }
        Err(job_error) if attempt < max_attempts => {
            info!(
                application_id = %job.application_id,
                code = %job_error.code,
                attempt,
                max_attempts,
                "transient failure, requeueing"
            );
            nack(&delivery, true).await;
        }
        Err(job_error) => {
            warn!(
                application_id = %job.application_id,
                code = %job_error.code,
                attempt,
                "retry budget exhausted, dead-lettering"
            );
            if publisher.publish_failed(&job, &job_error).await.is_err() {
                error!(application_id = %job.application_id, "publish failed before dead-letter");
            }
            nack(&delivery, false).await;
        }
    }
}

/// 1-based delivery attempt. Quorum queues carry `x-delivery-count` (prior
/// unsuccessful deliveries); classic queues only expose the redelivered flag,
/// which caps visible attempts at 2.
fn attempt_count(headers: Option<&FieldTable>, redelivered: bool) -> u32 {
    if let Some(table) = headers {
        for (key, value) in table.inner() {
            if key.as_str() == "x-delivery-count" {
                let count = match value {
                    AMQPValue::LongLongInt(v) => *v,
                    AMQPValue::LongInt(v) => *v as i64,
                    AMQPValue::ShortInt(v) => *v as i64,
                    AMQPValue::ShortShortInt(v) => *v as i64,
                    _ => continue,
                };
                return count.max(0) as u32 + 1;
            }
        }
    }
    if redelivered {
        2
    } else {
        1
    }
}

async fn ack(delivery: &Delivery) {
    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
        error!(error = %e, "failed to ack delivery");
    }
}

async fn nack(delivery: &Delivery, requeue: bool) {
    let options = BasicNackOptions {
        requeue,
        ..Default::default()
    };
    if let Err(e) = delivery.nack(options).await {
        error!(error = %e, "failed to nack delivery");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_count(count: i64) -> FieldTable {
        let mut table = FieldTable::default();
        table.insert("x-delivery-count".into(), AMQPValue::LongLongInt(count));
        table
    }

    #[test]
    fn test_first_delivery_is_attempt_one() {
        assert_eq!(attempt_count(None, false), 1);
    }

    #[test]
    fn test_redelivered_without_header_is_attempt_two() {
        assert_eq!(attempt_count(None, true), 2);
    }

    #[test]
    fn test_delivery_count_header_wins() {
        let table = table_with_count(4);
        assert_eq!(attempt_count(Some(&table), true), 5);
    }

    #[test]
    fn test_zero_delivery_count_is_attempt_one() {
        let table = table_with_count(0);
        assert_eq!(attempt_count(Some(&table), false), 1);
    }

    #[test]
    fn test_unrelated_headers_are_ignored() {
        let mut table = FieldTable::default();
        table.insert("content-source".into(), AMQPValue::LongString("s3".into()));
        assert_eq!(attempt_count(Some(&table), false), 1);
    }
}
