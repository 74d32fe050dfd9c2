use bytes::Bytes;
use futures::StreamExt;
use log::{ debug, warn };
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::llm::extract_delta;
use crate::models::frame::RelayFrame;
use crate::stream::decoder::{ lines, parse_data_line, DataLine };
use crate::stream::ByteStream;

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Open,
    Streaming,
    Done,
    ClosedOnError,
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayState::Done | RelayState::ClosedOnError)
    }
}

/// Rewrites upstream event lines into relay frames.
///
/// Once a terminal state is reached every further input is ignored.
#[derive(Debug)]
pub struct RelayEncoder {
    state: RelayState,
    fragments: usize,
    discarded: usize,
}

impl Default for RelayEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayEncoder {
    pub fn new() -> Self {
        Self {
            state: RelayState::Open,
            fragments: 0,
            discarded: 0,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn on_line(&mut self, line: &str) -> Option<RelayFrame> {
        if self.state.is_terminal() {
            return None;
        }
        match parse_data_line(line)? {
            DataLine::Done => {
                self.state = RelayState::Done;
                Some(RelayFrame::Done)
            }
            DataLine::Payload(payload) =>
                match extract_delta(payload) {
                    Ok(Some(fragment)) => {
                        self.state = RelayState::Streaming;
                        self.fragments += 1;
                        Some(RelayFrame::content(fragment))
                    }
                    Ok(None) => None,
                    Err(e) => {
                        self.discarded += 1;
                        debug!("Skipping upstream frame: {}", e);
                        None
                    }
                }
        }
    }

    pub fn on_read_error(&mut self, message: &str) -> Option<RelayFrame> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = RelayState::ClosedOnError;
        Some(RelayFrame::Error { message: message.to_string() })
    }

    /// Upstream closed without sending the sentinel.
    pub fn on_end(&mut self) -> Option<RelayFrame> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = RelayState::Done;
        Some(RelayFrame::Done)
    }
}

pub type RelayBody = ReceiverStream<Result<Bytes, Infallible>>;

/// Spawns the read loop for one upstream stream and returns the outbound body.
///
/// Dropping the returned stream stops the loop at its next write.
pub fn relay(upstream: ByteStream) -> RelayBody {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut encoder = RelayEncoder::new();
        let mut upstream_lines = Box::pin(lines(upstream));

        while let Some(line) = upstream_lines.next().await {
            let frame = match line {
                Ok(line) => encoder.on_line(&line),
                Err(e) => {
                    warn!("Upstream stream error after {} fragment(s): {}", encoder.fragments(), e);
                    encoder.on_read_error(&e.to_string())
                }
            };
            if let Some(frame) = frame {
                if tx.send(Ok(Bytes::from(frame.encode()))).await.is_err() {
                    debug!("Client went away; stopping relay");
                    return;
                }
            }
            if encoder.state().is_terminal() {
                break;
            }
        }

        if let Some(frame) = encoder.on_end() {
            let _ = tx.send(Ok(Bytes::from(frame.encode()))).await;
        }
        debug!(
            "Relay finished in {:?}: {} fragment(s), {} discarded",
            encoder.state(),
            encoder.fragments(),
            encoder.discarded()
        );
    });

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ RelayError, Result };

    fn delta(text: &str) -> String {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n\n", serde_json::json!(text))
    }

    async fn run(chunks: Vec<Result<Bytes>>) -> String {
        let body: Vec<Bytes> = relay(Box::pin(futures::stream::iter(chunks)))
            .map(|r| r.unwrap())
            .collect().await;
        body.iter()
            .map(|b| String::from_utf8(b.to_vec()).unwrap())
            .collect()
    }

    fn contents(out: &str) -> Vec<String> {
        out.split("\n\n")
            .filter_map(|f| f.strip_prefix("data: "))
            .filter_map(|p| serde_json::from_str::<RelayFrame>(p).ok())
            .filter_map(|f| match f {
                RelayFrame::Content { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn state_machine_walks_open_streaming_done() {
        let mut enc = RelayEncoder::new();
        assert_eq!(enc.state(), RelayState::Open);
        assert!(enc.on_line(": ping").is_none());
        assert_eq!(enc.state(), RelayState::Open);

        let frame = enc.on_line(delta("Hel").trim()).unwrap();
        assert!(matches!(frame, RelayFrame::Content { ref content, .. } if content == "Hel"));
        assert_eq!(enc.state(), RelayState::Streaming);

        assert_eq!(enc.on_line("data: [DONE]"), Some(RelayFrame::Done));
        assert_eq!(enc.state(), RelayState::Done);

        assert!(enc.on_line(delta("late").trim()).is_none());
        assert!(enc.on_read_error("boom").is_none());
        assert!(enc.on_end().is_none());
        assert_eq!(enc.fragments(), 1);
    }

    #[test]
    fn malformed_payload_is_counted_and_skipped() {
        let mut enc = RelayEncoder::new();
        assert!(enc.on_line("data: {not json").is_none());
        assert_eq!(enc.discarded(), 1);
        assert_eq!(enc.state(), RelayState::Open);
        assert!(enc.on_line(delta("ok").trim()).is_some());
    }

    #[test]
    fn read_error_closes_once() {
        let mut enc = RelayEncoder::new();
        enc.on_line(delta("partial").trim());
        let frame = enc.on_read_error("reset").unwrap();
        assert!(matches!(frame, RelayFrame::Error { .. }));
        assert_eq!(enc.state(), RelayState::ClosedOnError);
        assert!(enc.on_line("data: [DONE]").is_none());
        assert!(enc.on_end().is_none());
    }

    #[tokio::test]
    async fn relays_fragments_across_chunk_boundaries() {
        let wire = format!("{}{}data: [DONE]\n\n", delta("Hel"), delta("lo"));
        let (a, b) = wire.split_at(17);
        let out = run(vec![Ok(Bytes::from(a.to_string())), Ok(Bytes::from(b.to_string()))]).await;

        assert_eq!(contents(&out), vec!["Hel", "lo"]);
        assert!(out.ends_with("data: [DONE]\n\n"));
        assert_eq!(out.matches("[DONE]").count(), 1);
    }

    #[tokio::test]
    async fn malformed_frames_do_not_stop_the_relay() {
        let wire = format!("{}data: {{broken\n\n{}data: [DONE]\n\n", delta("a"), delta("b"));
        let out = run(vec![Ok(Bytes::from(wire))]).await;
        assert_eq!(contents(&out), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn nothing_is_written_after_the_sentinel() {
        let wire = format!("{}data: [DONE]\n\n{}", delta("a"), delta("after"));
        let out = run(vec![Ok(Bytes::from(wire))]).await;
        assert_eq!(contents(&out), vec!["a"]);
        assert!(out.ends_with("data: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn read_failure_ends_with_an_error_frame() {
        let out = run(vec![
            Ok(Bytes::from(delta("part"))),
            Err(RelayError::StreamRead("connection reset".into())),
        ]).await;

        assert_eq!(contents(&out), vec!["part"]);
        assert!(out.contains("\"type\":\"error\""));
        assert!(!out.contains("[DONE]"));
    }

    #[tokio::test]
    async fn missing_sentinel_still_terminates() {
        let out = run(vec![Ok(Bytes::from(delta("tail")))]).await;
        assert_eq!(contents(&out), vec!["tail"]);
        assert!(out.ends_with("data: [DONE]\n\n"));
    }
}
