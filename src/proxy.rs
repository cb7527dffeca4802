//! Live stream relay
//!
//! Fetches the upstream radio stream and pipes it to the client chunk by chunk,
//! so browsers never talk to the origin directly.

use crate::config::StreamConfig;
use crate::error::ApiError;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

pub struct StreamProxy {
    client: reqwest::Client,
    upstream_url: String,
}

impl StreamProxy {
    /// Only the connect phase is bounded; a live stream never finishes
    pub fn new(upstream_url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            upstream_url: upstream_url.into(),
        })
    }

    pub fn from_config(config: &StreamConfig) -> Result<Self> {
        Self::new(config.url.clone(), config.connect_timeout())
    }

    /// Open the upstream stream and wrap it in a streaming response
    pub async fn open(&self) -> Result<Response, ApiError> {
        info!("Proxying stream from: {}", self.upstream_url);

        let upstream = self
            .client
            .get(&self.upstream_url)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;

        let status = upstream.status();
        if !status.is_success() {
            return Err(ApiError::Upstream(format!(
                "upstream responded with {}",
                status
            )));
        }

        let content_type = upstream
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        // An Err item aborts the client connection instead of leaving it hanging
        let upstream_url = self.upstream_url.clone();
        let chunks = upstream
            .bytes_stream()
            .inspect_err(move |e| error!("Error in upstream data from {}: {}", upstream_url, e));

        Ok((
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "no-cache".to_string()),
            ],
            Body::from_stream(chunks),
        )
            .into_response())
    }
}
