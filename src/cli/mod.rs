use clap::{ Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the streaming relay that proxies `/api/chat` to the upstream provider.
    Serve(ServeArgs),
    /// Interactive terminal chat against a running relay.
    Chat(ChatArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host address and port for the relay to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Streaming chat completion endpoint (OpenAI-compatible).
    #[arg(long, env = "UPSTREAM_URL", default_value = "https://text.pollinations.ai/openai")]
    pub upstream_url: String,

    /// Model used when a request does not name one. Left to the provider if unset.
    #[arg(long, env = "DEFAULT_MODEL")]
    pub default_model: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ChatArgs {
    /// Relay chat endpoint.
    #[arg(long, env = "RELAY_URL", default_value = "http://127.0.0.1:3000/api/chat")]
    pub relay_url: String,

    /// Image endpoint; the URL-encoded prompt is appended as the last path segment.
    #[arg(long, env = "IMAGE_BASE_URL", default_value = "https://image.pollinations.ai/prompt/")]
    pub image_base_url: String,

    /// Model name sent with every request (e.g., openai, llamascout, deepseek)
    #[arg(long, env = "CHAT_MODEL")]
    pub model: Option<String>,

    /// Sampling temperature sent with every request.
    #[arg(long, env = "CHAT_TEMPERATURE")]
    pub temperature: Option<f64>,
}
