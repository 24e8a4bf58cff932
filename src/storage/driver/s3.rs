//! S3 gateway based on aws-sdk-s3, with bounded retry for transient
//! failures. Constructed once at startup and shared through `AppState`.

use std::future::Future;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use tokio::time::{Duration, sleep};

use crate::storage::{ObjectStore, StoreError};

pub struct S3Store {
    client: Client,
    bucket: String,
    public_base: String,
    max_retries: u32,
    initial_retry_delay_ms: u64,
}

impl S3Store {
    pub async fn new(bucket: &str, region: &str, endpoint: Option<String>) -> Self {
        let mut loader = aws_config::ConfigLoader::default().region(Region::new(region.to_string()));
        if let Some(endpoint) = &endpoint {
            loader = loader.endpoint_url(endpoint.as_str());
        }
        let conf = loader.load().await;
        let client = Client::new(&conf);

        // Virtual-hosted URLs against AWS proper, path-style against a
        // custom endpoint (MinIO and friends).
        let public_base = match &endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            None => format!("https://{bucket}.s3.{region}.amazonaws.com"),
        };

        S3Store {
            client,
            bucket: bucket.to_string(),
            public_base,
            max_retries: 3,
            initial_retry_delay_ms: 100,
        }
    }

    async fn with_retry<T, E, F, Fut>(&self, op: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SdkError<E>>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let err = classify(op, e);
                    if !err.is_retryable() || attempt > self.max_retries {
                        return Err(err);
                    }
                    let delay_ms = self.initial_retry_delay_ms * 2u64.pow(attempt - 1);
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}

fn classify<E>(op: &'static str, err: SdkError<E>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let transient = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(ctx) => ctx.raw().status().as_u16() >= 500,
        _ => false,
    };
    let message = err.to_string();
    if transient {
        StoreError::Transient { op, message }
    } else {
        StoreError::Permanent { op, message }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, data: &[u8]) -> Result<String, StoreError> {
        let body = data.to_vec();
        self.with_retry("put", || async {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body.clone().into())
                .send()
                .await
        })
        .await?;
        Ok(self.url_for(key))
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
        self.with_retry("copy", || async {
            self.client
                .copy_object()
                .bucket(&self.bucket)
                .copy_source(format!("{}/{}", self.bucket, src_key))
                .key(dst_key)
                .send()
                .await
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        // S3 DeleteObject already succeeds for missing keys.
        self.with_retry("delete", || async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
        })
        .await?;
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}
