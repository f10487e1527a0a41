//! Object-store access.
//!
//! The pipeline depends on the [`ObjectFetcher`] trait; the S3 client behind
//! it is the only code that touches the network for file retrieval. Fetching
//! is a synchronous call because the pipeline runs on blocking threads; the
//! store holds a runtime handle to drive the async SDK.

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use tokio::runtime::Handle;
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::StorageError;

pub trait ObjectFetcher: Send + Sync {
    fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    handle: Handle,
    max_object_bytes: u64,
}

impl S3ObjectStore {
    /// Builds a client for the configured endpoint. Path-style addressing is
    /// forced: MinIO and other self-hosted stores do not resolve
    /// virtual-hosted bucket names.
    ///
    /// `max_object_bytes` bounds what `fetch` will buffer; objects the store
    /// reports as larger are rejected before the body is read.
    pub fn new(config: &StorageConfig, max_object_bytes: u64, handle: Handle) -> Self {
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .force_path_style(true);

        if !config.access_key_id.is_empty() {
            builder = builder.credentials_provider(Credentials::new(
                config.access_key_id.clone(),
                config.secret_access_key.clone(),
                None,
                None,
                "cv-parser-config",
            ));
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            handle,
            max_object_bytes,
        }
    }
}

impl ObjectFetcher for S3ObjectStore {
    fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let request = self.client.get_object().bucket(bucket).key(key).send();

        // Runs on a pool/blocking thread, never on a runtime worker.
        let output = self.handle.block_on(request).map_err(|e| {
            let service_err = e.into_service_error();
            if service_err.is_no_such_key() {
                StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StorageError::Request(service_err.to_string())
            }
        })?;

        // Reject oversized objects from the reported length, before
        // buffering the body.
        if let Some(size) = output.content_length() {
            if size > self.max_object_bytes as i64 {
                return Err(StorageError::ObjectTooLarge {
                    size,
                    max_bytes: self.max_object_bytes,
                });
            }
        }

        let bytes = self
            .handle
            .block_on(output.body.collect())
            .map_err(|e| StorageError::Request(format!("failed to read body: {}", e)))?
            .into_bytes()
            .to_vec();

        debug!(bucket, key, size = bytes.len(), "object fetched");
        Ok(bytes)
    }
}
