use async_trait::async_trait;
use log::info;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE } };

use crate::error::Result;
use crate::models::chat::ChatRequest;
use crate::stream::{ open_post_stream, ByteSource, ByteStream };

pub const DEFAULT_UPSTREAM_URL: &str = "https://text.pollinations.ai/openai";

/// Streams chat completions from the hosted, OpenAI-compatible endpoint.
pub struct UpstreamClient {
    http: HttpClient,
    url: String,
    default_model: Option<String>,
}

impl UpstreamClient {
    pub fn new(url: Option<String>, default_model: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            url: url.unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
            default_model,
        })
    }
}

#[async_trait]
impl ByteSource for UpstreamClient {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        let payload = request.clone().prepare_for_upstream(self.default_model.as_deref());
        info!(
            "Forwarding {} message(s) upstream (model: {})",
            payload.messages.len(),
            payload.model.as_deref().unwrap_or("provider default")
        );
        open_post_stream(&self.http, &self.url, &payload).await
    }
}
