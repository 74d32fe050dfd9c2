pub mod api;

use crate::cli::ServeArgs;
use crate::llm::upstream::UpstreamClient;
use crate::stream::ByteSource;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    addr: String,
    upstream: Arc<dyn ByteSource>,
    args: ServeArgs,
}

impl Server {
    pub fn new(addr: String, upstream: Arc<dyn ByteSource>, args: ServeArgs) -> Self {
        Self { addr, upstream, args }
    }

    pub fn from_args(args: ServeArgs) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let upstream = UpstreamClient::new(
            Some(args.upstream_url.clone()),
            args.default_model.clone()
        )?;
        Ok(Self::new(args.server_addr.clone(), Arc::new(upstream), args))
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(&self.addr, self.upstream.clone(), &self.args).await
    }
}
