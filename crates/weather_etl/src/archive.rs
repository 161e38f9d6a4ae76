//! Raw forecast archive on an S3-compatible object store (MinIO).
//!
//! Objects go through `object_store`'s S3 client. Bucket-level calls
//! (existence check, creation) are not part of the `ObjectStore` API, so they
//! are sent as presigned HEAD/PUT requests generated by the same client.

use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::config::MinioConfig;
use crate::error::SinkError;
use crate::model::RawForecast;

const JSON_CONTENT_TYPE: &str = "application/json";

/// How long presigned bucket requests stay valid.
const PRESIGN_TTL: Duration = Duration::from_secs(60);

/// Result of a create-bucket call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketCreation {
    Created,
    /// Someone else created it first.
    AlreadyExists,
}

/// Bucket-oriented object store.
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, SinkError>;
    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation, SinkError>;
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), SinkError>;
}

/// MinIO over the S3 API.
pub struct MinioSink {
    config: MinioConfig,
    http: reqwest::Client,
}

impl MinioSink {
    pub fn new(config: &MinioConfig) -> Self {
        Self {
            config: config.clone(),
            http: reqwest::Client::new(),
        }
    }

    fn client_for_bucket(&self, bucket: &str) -> Result<AmazonS3, SinkError> {
        let client = AmazonS3Builder::new()
            .with_region(&self.config.region)
            .with_endpoint(self.config.url())
            .with_bucket_name(bucket)
            .with_access_key_id(&self.config.access_key)
            .with_secret_access_key(&self.config.secret_key)
            .with_allow_http(!self.config.secure)
            // Path-style URLs (http://minio:9000/bucket/key) for MinIO
            .with_virtual_hosted_style_request(false)
            .build()?;
        Ok(client)
    }

    /// Send a presigned request against the bucket itself.
    async fn bucket_request(
        &self,
        bucket: &str,
        method: Method,
    ) -> Result<reqwest::Response, SinkError> {
        let client = self.client_for_bucket(bucket)?;
        let url = client
            .signed_url(method.clone(), &Path::from(""), PRESIGN_TTL)
            .await?;
        Ok(self.http.request(method, url.as_str()).send().await?)
    }
}

#[async_trait]
impl ArchiveSink for MinioSink {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, SinkError> {
        let response = self.bucket_request(bucket, Method::HEAD).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(SinkError::Status {
                status: status.as_u16(),
                message: format!("HEAD bucket '{}'", bucket),
            }),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation, SinkError> {
        let response = self.bucket_request(bucket, Method::PUT).await?;
        match response.status() {
            status if status.is_success() => Ok(BucketCreation::Created),
            // BucketAlreadyOwnedByYou / BucketAlreadyExists
            StatusCode::CONFLICT => Ok(BucketCreation::AlreadyExists),
            status => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                Err(SinkError::Status {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), SinkError> {
        let client = self.client_for_bucket(bucket)?;
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        client
            .put_opts(
                &Path::from(key),
                PutPayload::from(body),
                PutOptions::from(attributes),
            )
            .await?;
        Ok(())
    }
}

/// Object key for a city's raw forecast.
pub fn object_key(city: &str, date: &str) -> String {
    format!("{}_{}.json", city, date)
}

/// Writes raw forecasts into the archive bucket.
pub struct RawArchiver {
    sink: Arc<dyn ArchiveSink>,
    bucket: String,
}

impl RawArchiver {
    pub fn new(sink: Arc<dyn ArchiveSink>, bucket: &str) -> Self {
        Self {
            sink,
            bucket: bucket.to_string(),
        }
    }

    /// Store `forecast` as pretty JSON under `{city}_{date}.json`.
    ///
    /// Returns the object key. Callers treat failures as best-effort.
    pub async fn archive(&self, forecast: &RawForecast, date: &str) -> Result<String, SinkError> {
        self.ensure_bucket().await?;

        let key = object_key(&forecast.city, date);
        let body = serde_json::to_vec_pretty(forecast)?;
        self.sink
            .put_object(&self.bucket, &key, body, JSON_CONTENT_TYPE)
            .await?;
        log::info!("[Archive] stored {}/{}", self.bucket, key);
        Ok(key)
    }

    async fn ensure_bucket(&self) -> Result<(), SinkError> {
        if self.sink.bucket_exists(&self.bucket).await? {
            return Ok(());
        }
        match self.sink.create_bucket(&self.bucket).await? {
            BucketCreation::Created => log::info!("[Archive] created bucket {}", self.bucket),
            BucketCreation::AlreadyExists => {
                log::debug!("[Archive] bucket {} created concurrently", self.bucket)
            }
        }
        Ok(())
    }
}
