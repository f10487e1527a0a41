//! AMQP boundary: topology, consumption, publishing.

pub mod consumer;
pub mod publisher;
pub mod topology;

pub use consumer::EventConsumer;
pub use publisher::EventPublisher;
