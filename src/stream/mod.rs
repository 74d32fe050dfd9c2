pub mod decoder;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{ Stream, StreamExt };
use log::debug;
use reqwest::{ Client as HttpClient, StatusCode };
use std::pin::Pin;

use crate::error::{ RelayError, Result };
use crate::models::chat::ChatRequest;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Opens one byte stream per request. Reading is `next()` on the stream;
/// `None` is end of stream.
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream>;
}

/// POSTs `body` as JSON and hands back the response body as a byte stream.
///
/// Connection failures and non-2xx statuses become `UpstreamUnavailable`; a
/// 2xx without a body becomes `NoResponseBody`.
pub async fn open_post_stream<T>(http: &HttpClient, url: &str, body: &T) -> Result<ByteStream>
    where T: serde::Serialize + ?Sized
{
    let resp = http
        .post(url)
        .json(body)
        .send().await
        .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(RelayError::UpstreamUnavailable(format!("{} returned {}", url, status)));
    }
    if status == StatusCode::NO_CONTENT || resp.content_length() == Some(0) {
        return Err(RelayError::NoResponseBody);
    }
    debug!("Opened stream from {} ({})", url, status);

    let bytes = resp
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| RelayError::StreamRead(e.to_string())));
    Ok(Box::pin(bytes))
}
