use crate::cli::ServeArgs;
use crate::models::chat::ChatRequest;
use crate::relay::relay;
use crate::stream::ByteSource;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::{ Body, Bytes },
    extract::State,
    http::{ header, StatusCode },
    response::{ IntoResponse, Response },
    routing::post,
    Json,
    Router,
};
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

const PROXY_ERROR: &str = "Failed to proxy request";

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
struct AppState {
    upstream: Arc<dyn ByteSource>,
}

pub fn router(upstream: Arc<dyn ByteSource>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .layer(cors)
        .with_state(AppState { upstream })
}

pub async fn start_http_server(
    addr: &str,
    upstream: Arc<dyn ByteSource>,
    args: &ServeArgs,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    let app = router(upstream);

    if args.enable_tls {
        let (cert_path, key_path) = match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert), Some(key)) => (cert, key),
            _ => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("TLS enabled without cert/key".into());
            }
        };
        info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("Relay listening on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind relay to {}: {}. Try a different port.", addr, e);
            e
        })?;
        info!("Relay listening on: http://{}", addr);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

fn proxy_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: PROXY_ERROR.to_string() }),
    ).into_response()
}

/// Body is taken raw so that any parse failure answers 500 with the JSON error
/// shape instead of axum's extractor rejection.
async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            error!("Proxy error: invalid request body: {}", e);
            return proxy_error();
        }
    };

    let upstream = match state.upstream.open(&request).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Proxy error: {}", e);
            return proxy_error();
        }
    };

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(relay(upstream)),
    ).into_response()
}
