use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cv_parser::bus::{topology, EventConsumer, EventPublisher};
use cv_parser::config::{self, StartupGuard};
use cv_parser::error::CvParserError;
use cv_parser::llm::{CvExtractor, CvScorer, GeminiClient};
use cv_parser::pipeline::Pipeline;
use cv_parser::processor::{DecoderRegistry, DisabledOcr};
use cv_parser::security::{EndpointGuard, FileGuard, PiiRedactor};
use cv_parser::storage::S3ObjectStore;
use cv_parser::worker::WorkPoolManager;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CvParserError> {
    let config = config::load_from_env()?;
    info!(profile = config.profile.as_str(), "starting cv-parser");

    for warning in StartupGuard::check(&config)? {
        warn!("{}", warning);
    }
    EndpointGuard::validate(&config.storage.endpoint)?;

    let handle = Handle::current();

    let max_object_bytes = config.file.max_size_mb * 1024 * 1024;
    let storage = Arc::new(S3ObjectStore::new(
        &config.storage,
        max_object_bytes,
        handle.clone(),
    ));
    let pools = Arc::new(WorkPoolManager::new(&config.pools));
    let decoders = Arc::new(DecoderRegistry::standard(config.file.max_pages));

    let llm_client =
        GeminiClient::from_config(&config.llm, handle.clone()).map(Arc::new);
    let extractor = llm_client
        .as_ref()
        .map(|c| Arc::clone(c) as Arc<dyn CvExtractor>);
    let scorer = llm_client
        .as_ref()
        .map(|c| Arc::clone(c) as Arc<dyn CvScorer>);

    let pipeline = Arc::new(Pipeline::new(
        FileGuard::new(&config.file),
        PiiRedactor::new(),
        Arc::clone(&pools),
        storage,
        decoders,
        Arc::new(DisabledOcr),
        extractor,
        scorer,
    ));

    let connection = lapin::Connection::connect(
        &config.amqp.uri,
        lapin::ConnectionProperties::default(),
    )
    .await
    .map_err(cv_parser::error::BusError::from)?;
    let channel = connection
        .create_channel()
        .await
        .map_err(cv_parser::error::BusError::from)?;
    topology::declare(&channel).await?;

    let publish_channel = connection
        .create_channel()
        .await
        .map_err(cv_parser::error::BusError::from)?;
    let publisher = Arc::new(EventPublisher::bind(publish_channel).await?);
    let consumer = EventConsumer::new(
        channel,
        publisher,
        pipeline,
        config.amqp.prefetch,
        config.amqp.max_attempts,
    );

    tokio::select! {
        result = consumer.run() => {
            error!("consumer stopped unexpectedly");
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    // Stop admitting work everywhere, then let each pool finish what it can.
    pools.begin_shutdown();
    let drain_pools = Arc::clone(&pools);
    let reports = tokio::task::spawn_blocking(move || drain_pools.drain())
        .await
        .unwrap_or_default();
    for report in reports {
        info!(
            pool = report.pool,
            completed = report.completed,
            abandoned = report.abandoned,
            "pool drained"
        );
    }

    info!("cv-parser stopped");
    Ok(())
}
