//! services/api/src/adapters/storage.rs
//!
//! Object-storage adapter speaking the Supabase storage REST API. The
//! client is injected and constructed once at startup; every mutation
//! carries an explicit timeout and a bounded retry, since the collaborator
//! sits across the network.

use async_trait::async_trait;
use reqwest::{header, Method, StatusCode};
use std::time::Duration;
use study_spots_core::ports::{ObjectStorage, PortError, PortResult};
use tracing::warn;

/// Storage adapter backed by a Supabase-style `/storage/v1` endpoint.
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retries: u32,
}

impl SupabaseStorage {
    /// Builds the adapter with its own HTTP client. `base_url` is the
    /// service root, without a trailing slash.
    pub fn new(
        base_url: String,
        api_key: String,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
            retries,
        })
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    /// Sends the object, retrying transport failures and server errors up
    /// to the configured bound. Client errors (e.g. "object exists" on an
    /// upload) are surfaced immediately.
    async fn send_object(
        &self,
        method: Method,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> PortResult<String> {
        let url = self.object_url(bucket, path);
        let mut last_error = String::new();

        for attempt in 0..=self.retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
            }

            let result = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.api_key)
                .header(header::CONTENT_TYPE, content_type)
                .body(bytes.to_vec())
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    return Ok(self.public_url(bucket, path));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    last_error = format!("{}: {}", status, body);
                    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                        break;
                    }
                }
                Err(e) => last_error = e.to_string(),
            }
            warn!(
                "Storage {} {} failed (attempt {} of {}): {}",
                method,
                url,
                attempt + 1,
                self.retries + 1,
                last_error
            );
        }

        Err(PortError::Storage(format!(
            "{} {} failed: {}",
            method, url, last_error
        )))
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> PortResult<String> {
        self.send_object(Method::POST, bucket, path, bytes, content_type)
            .await
    }

    async fn update(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> PortResult<String> {
        self.send_object(Method::PUT, bucket, path, bytes, content_type)
            .await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }
}

/// Stand-in used when no storage credentials are configured: every
/// mutation fails with a Storage error, so image uploads degrade to
/// warnings and document uploads abort, exactly as with an unreachable
/// backend.
pub struct DisabledStorage;

#[async_trait]
impl ObjectStorage for DisabledStorage {
    async fn upload(
        &self,
        _bucket: &str,
        _path: &str,
        _bytes: &[u8],
        _content_type: &str,
    ) -> PortResult<String> {
        Err(PortError::Storage(
            "storage client is not configured".to_string(),
        ))
    }

    async fn update(
        &self,
        _bucket: &str,
        _path: &str,
        _bytes: &[u8],
        _content_type: &str,
    ) -> PortResult<String> {
        Err(PortError::Storage(
            "storage client is not configured".to_string(),
        ))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("/{}/{}", bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> SupabaseStorage {
        SupabaseStorage::new(
            "https://example.supabase.co".to_string(),
            "service-key".to_string(),
            Duration::from_secs(5),
            2,
        )
        .unwrap()
    }

    #[test]
    fn public_url_points_at_the_public_object_route() {
        let storage = adapter();
        assert_eq!(
            storage.public_url("study_spots", "spots/abc/main.png"),
            "https://example.supabase.co/storage/v1/object/public/study_spots/spots/abc/main.png"
        );
    }

    #[test]
    fn object_url_points_at_the_authenticated_route() {
        let storage = adapter();
        assert_eq!(
            storage.object_url("avatars", "users/1/avatar_final.jpg"),
            "https://example.supabase.co/storage/v1/object/avatars/users/1/avatar_final.jpg"
        );
    }

    #[tokio::test]
    async fn disabled_storage_rejects_mutations() {
        let err = DisabledStorage
            .upload("avatars", "x", &[1], "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Storage(_)));
    }
}
