//! Exchange, queue and dead-letter topology.
//!
//! Declarations are idempotent; every service on the bus declares the same
//! topology so startup order does not matter.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};
use tracing::info;

use crate::error::BusError;

pub const EXCHANGE_NAME: &str = "talentflow.events";
pub const CV_PARSER_QUEUE: &str = "cv_parser.jobs";
pub const CV_PARSER_DLQ: &str = "cv_parser.jobs.dlq";

pub const ROUTING_KEY_UPLOADED: &str = "cv.uploaded";
pub const ROUTING_KEY_PARSED: &str = "cv.parsed";
pub const ROUTING_KEY_FAILED: &str = "cv.failed";

/// Messages in the work queue expire after 24 hours and dead-letter.
const MESSAGE_TTL_MS: i64 = 86_400_000;

pub async fn declare(channel: &Channel) -> Result<(), BusError> {
    channel
        .exchange_declare(
            EXCHANGE_NAME,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    // DLQ first, the work queue references it.
    channel
        .queue_declare(
            CV_PARSER_DLQ,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    let mut args = FieldTable::default();
    // Default exchange: dead-lettered messages route straight to the DLQ by
    // queue name.
    args.insert("x-dead-letter-exchange".into(), AMQPValue::LongString("".into()));
    args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(CV_PARSER_DLQ.into()),
    );
    args.insert("x-message-ttl".into(), AMQPValue::LongLongInt(MESSAGE_TTL_MS));

    channel
        .queue_declare(
            CV_PARSER_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            args,
        )
        .await?;

    channel
        .queue_bind(
            CV_PARSER_QUEUE,
            EXCHANGE_NAME,
            ROUTING_KEY_UPLOADED,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(
        exchange = EXCHANGE_NAME,
        queue = CV_PARSER_QUEUE,
        "topology declared"
    );
    Ok(())
}
