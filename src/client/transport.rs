use async_trait::async_trait;
use reqwest::Client as HttpClient;

use crate::error::Result;
use crate::models::chat::ChatRequest;
use crate::stream::{ open_post_stream, ByteSource, ByteStream };

/// Opens the relay's `/api/chat` stream, the client's half of the pipeline.
pub struct RelayClient {
    http: HttpClient,
    endpoint: String,
}

impl RelayClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ByteSource for RelayClient {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        open_post_stream(&self.http, &self.endpoint, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::commands::Input;
    use crate::client::consumer::{ ConsumeOutcome, StreamConsumer, STREAM_ERROR_TEXT };
    use crate::client::dispatcher::{ Dispatcher, Outcome };
    use crate::client::image::ImageClient;
    use crate::error::RelayError;
    use crate::client::store::{ Action, SessionStore };
    use crate::models::chat::ChatMessage;
    use crate::models::session::{ ConversationTurn, Session, TurnKind };
    use crate::server::api::router;
    use crate::stream::testing::ScriptedSource;
    use std::sync::Arc;

    #[tokio::test]
    async fn full_pipeline_over_http() {
        let upstream = Arc::new(ScriptedSource::chunks(&[
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"lo\"}}]}\n\ndata: [DONE]\n\n",
        ]));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(upstream)).await.unwrap();
        });

        let store = SessionStore::new();
        let session = Session::new();
        let sid = session.id.clone();
        store.apply(Action::CreateSession(session));
        let turn = ConversationTurn::pending(TurnKind::Text);
        let tid = turn.id.clone();
        store.apply(Action::PushTurn { session_id: sid.clone(), turn });

        let client = RelayClient::new(format!("http://{}/api/chat", addr));
        let stream = client
            .open(&ChatRequest::new(vec![ChatMessage::new("user", "hi")])).await
            .unwrap();
        let outcome = StreamConsumer::new(&store, &sid, &tid).consume(stream).await;

        assert_eq!(outcome, ConsumeOutcome::Completed);
        let snap = store.snapshot();
        let done = snap.session(&sid).unwrap().turn(&tid).unwrap();
        assert_eq!(done.text, "Hello");
        assert!(!done.streaming);
    }

    #[tokio::test]
    async fn upstream_outage_surfaces_as_the_error_text() {
        let upstream = Arc::new(ScriptedSource::failing(
            RelayError::UpstreamUnavailable("503 Service Unavailable".into())
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(upstream)).await.unwrap();
        });

        let dispatcher = Dispatcher::new(
            SessionStore::new(),
            Arc::new(RelayClient::new(format!("http://{}/api/chat", addr))),
            ImageClient::new("http://127.0.0.1:9/prompt/").unwrap(),
            None,
            None
        );
        let outcome = dispatcher.dispatch(Input::Message("hello?".into())).await;
        assert_eq!(outcome, Outcome::Reply(ConsumeOutcome::Failed));

        let snap = dispatcher.store().snapshot();
        let last = snap.current_session().unwrap().turns.last().unwrap();
        assert_eq!(last.text, STREAM_ERROR_TEXT);
        assert!(!last.streaming);
    }
}
