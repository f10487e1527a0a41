//! Terminal event publishing.

use chrono::Utc;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::{BasicProperties, Channel};
use tracing::info;

use crate::bus::topology::{EXCHANGE_NAME, ROUTING_KEY_FAILED, ROUTING_KEY_PARSED};
use crate::error::{BusError, JobError};
use crate::events::{CvFailedEvent, CvParsedEvent};
use crate::worker::{Job, JobOutcome};

pub struct EventPublisher {
    channel: Channel,
}

impl EventPublisher {
    /// Puts the channel into publisher-confirm mode before handing it out.
    /// Without `confirm_select` the confirmation awaited in `publish` is a
    /// no-op and a publish-then-ack could lose the terminal event.
    pub async fn bind(channel: Channel) -> Result<Self, BusError> {
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        Ok(Self { channel })
    }

    pub async fn publish_parsed(&self, job: &Job, outcome: JobOutcome) -> Result<(), BusError> {
        let event = CvParsedEvent {
            candidate_id: job.candidate_id.clone(),
            application_id: job.application_id.clone(),
            job_id: job.job_id.clone(),
            ai_score: outcome.ai_score,
            parsed_data: outcome.parsed_data,
            scoring_reasoning: outcome.scoring_reasoning,
            parsed_at: Utc::now(),
        };
        self.publish(ROUTING_KEY_PARSED, &serde_json::to_vec(&event)?)
            .await?;
        info!(
            application_id = %job.application_id,
            score = event.ai_score,
            "published cv.parsed"
        );
        Ok(())
    }

    pub async fn publish_failed(&self, job: &Job, error: &JobError) -> Result<(), BusError> {
        let event = CvFailedEvent {
            candidate_id: job.candidate_id.clone(),
            application_id: job.application_id.clone(),
            job_id: job.job_id.clone(),
            error_code: error.code.as_str().to_string(),
            error_message: error.message.clone(),
            retryable: error.retryable,
            failed_at: Utc::now(),
        };
        self.publish(ROUTING_KEY_FAILED, &serde_json::to_vec(&event)?)
            .await?;
        info!(
            application_id = %job.application_id,
            code = %error.code,
            retryable = error.retryable,
            "published cv.failed"
        );
        Ok(())
    }

    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), BusError> {
        // Persistent delivery; wait for broker confirm before acking the
        // inbound message.
        self.channel
            .basic_publish(
                EXCHANGE_NAME,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2),
            )
            .await?
            .await?;
        Ok(())
    }
}
