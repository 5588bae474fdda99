//! HTTP collaborators: the remote profile store and the media uploader.

use async_trait::async_trait;
use gupshup_shared::{ApiError, UserId};
use reqwest::{multipart, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::stores::RemoteProfile;

/// An image picked by the user, not yet uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Remote profile store. Reads seed the local cache; writes are best-effort.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, user_id: &UserId) -> Result<RemoteProfile, ApiError>;

    async fn update_profile(
        &self,
        user_id: &UserId,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<(), ApiError>;
}

/// Turns a blob into a persistent URL.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, blob: MediaBlob) -> Result<String, ApiError>;
}

#[derive(Debug, Serialize)]
struct ProfileUpdateRequest<'a> {
    user_id: &'a UserId,
    display_name: &'a str,
    photo_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// HTTP client for the chat server's REST endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        read_json(resp).await
    }

    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        read_json(resp).await
    }
}

async fn read_json<TRes: DeserializeOwned>(resp: reqwest::Response) -> Result<TRes, ApiError> {
    let status = resp.status().as_u16();
    let is_success = resp.status().is_success();
    let text = resp
        .text()
        .await
        .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

    if !is_success {
        return Err(ApiError::Http { status, body: text });
    }

    if text.is_empty() {
        serde_json::from_str("null").map_err(|e| ApiError::Deserialize(e.to_string()))
    } else {
        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }
}

pub(crate) fn profile_path(user_id: &UserId) -> String {
    format!(
        "/api/user?user_id={}",
        urlencoding::encode(&user_id.to_string())
    )
}

#[async_trait]
impl ProfileStore for ApiClient {
    async fn fetch_profile(&self, user_id: &UserId) -> Result<RemoteProfile, ApiError> {
        self.get_json(&profile_path(user_id)).await
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> Result<(), ApiError> {
        let body = ProfileUpdateRequest {
            user_id,
            display_name,
            photo_url,
        };
        let _: serde_json::Value = self.post_json("/api/user/update", &body).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaUploader for ApiClient {
    async fn upload(&self, blob: MediaBlob) -> Result<String, ApiError> {
        let part = multipart::Part::bytes(blob.bytes)
            .file_name(blob.file_name)
            .mime_str(&blob.mime)
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let form = multipart::Form::new().part("image", part);

        let resp = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let uploaded: UploadResponse = read_json(resp).await?;
        Ok(uploaded.url)
    }
}
