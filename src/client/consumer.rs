use futures::StreamExt;
use log::{ debug, warn };

use super::store::{ Action, SessionStore };
use crate::error::RelayError;
use crate::models::frame::RelayFrame;
use crate::models::session::TurnKind;
use crate::stream::decoder::{ lines, parse_data_line, DataLine };
use crate::stream::ByteStream;

pub const STREAM_ERROR_TEXT: &str = "Error: Failed to get response from AI";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// `[DONE]` or a clean end of stream.
    Completed,
    /// The relay reported an upstream failure after streaming began.
    ClosedOnError,
    /// The stream could not be read; the turn now shows the error text.
    Failed,
}

/// Feeds one relay stream into the streaming turn `turn_id`.
pub struct StreamConsumer<'a> {
    store: &'a SessionStore,
    session_id: String,
    turn_id: String,
    received: String,
}

impl<'a> StreamConsumer<'a> {
    pub fn new(store: &'a SessionStore, session_id: &str, turn_id: &str) -> Self {
        Self {
            store,
            session_id: session_id.to_string(),
            turn_id: turn_id.to_string(),
            received: String::new(),
        }
    }

    /// Text accumulated so far, in arrival order.
    pub fn received(&self) -> &str {
        &self.received
    }

    pub async fn consume(&mut self, stream: ByteStream) -> ConsumeOutcome {
        let mut frames = Box::pin(lines(stream));

        while let Some(line) = frames.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Relay stream read failed: {}", e);
                    return self.fail();
                }
            };
            let payload = match parse_data_line(&line) {
                Some(DataLine::Done) => {
                    return self.complete();
                }
                Some(DataLine::Payload(payload)) => payload,
                None => {
                    continue;
                }
            };

            match serde_json::from_str::<RelayFrame>(payload) {
                Ok(RelayFrame::Content { content, .. }) => self.append(content),
                Ok(RelayFrame::Error { message }) => {
                    warn!("Relay closed on upstream error: {}", message);
                    return self.close_on_error();
                }
                Ok(RelayFrame::Done) => {
                    return self.complete();
                }
                Err(e) => {
                    debug!("{}", RelayError::MalformedFrame(e.to_string()));
                }
            }
        }

        self.complete()
    }

    /// Marks the turn failed without reading anything, e.g. when the relay
    /// could not be reached.
    pub fn fail(&mut self) -> ConsumeOutcome {
        self.store.apply(Action::ReplaceTurn {
            session_id: self.session_id.clone(),
            turn_id: self.turn_id.clone(),
            text: STREAM_ERROR_TEXT.to_string(),
            kind: TurnKind::Notice,
        });
        ConsumeOutcome::Failed
    }

    fn append(&mut self, fragment: String) {
        if fragment.is_empty() {
            return;
        }
        self.received.push_str(&fragment);
        self.store.apply(Action::AppendFragment {
            session_id: self.session_id.clone(),
            turn_id: self.turn_id.clone(),
            fragment,
        });
    }

    fn complete(&mut self) -> ConsumeOutcome {
        self.store.apply(Action::CompleteTurn {
            session_id: self.session_id.clone(),
            turn_id: self.turn_id.clone(),
        });
        ConsumeOutcome::Completed
    }

    /// Partial text is kept; an answer with no text at all shows the error text.
    fn close_on_error(&mut self) -> ConsumeOutcome {
        if self.received.is_empty() {
            self.fail()
        } else {
            self.complete();
            ConsumeOutcome::ClosedOnError
        }
    }
}
