use log::{ info, warn };
use reqwest::Client as HttpClient;
use url::Url;

use crate::error::{ RelayError, Result };

pub const IMAGE_ERROR_TEXT: &str = "Error generating image";

#[derive(Clone)]
pub struct ImageClient {
    http: HttpClient,
    base_url: Url,
}

impl ImageClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    /// `<base>/<prompt>` with the prompt percent-encoded as one path segment.
    pub fn prompt_url(&self, prompt: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RelayError::InvalidRequest(format!("{} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push(prompt);
        Ok(url)
    }

    /// Returns the URL of the generated image. Only the status is checked.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = self.prompt_url(prompt)?;
        info!("Requesting image: {}", url);
        let resp = self.http
            .get(url)
            .send().await
            .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            warn!("Image endpoint returned {}", resp.status());
            return Err(RelayError::UpstreamUnavailable(format!("image endpoint returned {}", resp.status())));
        }
        Ok(resp.url().to_string())
    }
}
