//! Cloudinary-hosted media via its signed upload API

use super::{ImageTransform, MediaError, MediaStorage, UploadedImage};
use crate::core::config::CloudinaryConfig;
use crate::core::models::Photo;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct CloudinaryStorage {
    client: Client,
    api_base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryStorage {
    pub fn new(config: &CloudinaryConfig) -> Result<Self, MediaError> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", self.api_base_url, self.cloud_name, action)
    }

    /// SHA-256 over the sorted `k=v` pairs joined by `&`, followed by the secret
    pub(crate) fn sign(params: &[(&str, String)], secret: &str) -> String {
        let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn signed_form(&self, params: Vec<(&'static str, String)>) -> Form {
        let signature = Self::sign(&params, &self.api_secret);
        let mut form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }
        form
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) => format!("{} ({})", body.error.message, status),
            Err(_) => format!("status {}", status),
        }
    }
}

fn timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

#[async_trait]
impl MediaStorage for CloudinaryStorage {
    async fn upload(
        &self,
        folder: &str,
        image: &UploadedImage,
        transform: ImageTransform,
    ) -> Result<Photo, MediaError> {
        let params = vec![
            ("folder", folder.to_string()),
            ("timestamp", timestamp()),
            ("transformation", transform.to_param()),
        ];
        let file = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)?;
        let form = self.signed_form(params).part("file", file);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaError::Upload(Self::error_message(response).await));
        }

        let uploaded: UploadResponse = response.json().await?;
        debug!("Uploaded {} to Cloudinary", uploaded.public_id);
        Ok(Photo {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), MediaError> {
        let params = vec![("public_id", public_id.to_string()), ("timestamp", timestamp())];
        let response = self
            .client
            .post(self.endpoint("destroy"))
            .multipart(self.signed_form(params))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaError::Delete(Self::error_message(response).await));
        }

        let destroyed: DestroyResponse = response.json().await?;
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::Delete(format!("{}: {}", public_id, other))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "cloudinary"
    }
}
