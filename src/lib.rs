pub mod cli;
pub mod client;
pub mod error;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;
pub mod stream;

use cli::{ Args, Command };
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command {
        Command::Serve(serve) => {
            info!("--- Relay Configuration ---");
            info!("Server Address: {}", serve.server_addr);
            info!("Upstream URL: {}", serve.upstream_url);
            info!("Default Model: {}", serve.default_model.as_deref().unwrap_or("provider default"));
            info!("TLS Enabled: {}", serve.enable_tls);
            info!("---------------------------");

            let server = Server::from_args(serve)?;
            server.run().await
        }
        Command::Chat(chat) => client::run(chat).await,
    }
}
