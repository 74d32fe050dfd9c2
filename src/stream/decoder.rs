use bytes::Bytes;
use futures::{ Stream, StreamExt };
use log::debug;

use crate::error::{ RelayError, Result };
use crate::models::frame::DONE_SENTINEL;

const DATA_PREFIX: &str = "data:";

/// Longest line kept in memory. Anything longer is dropped as a malformed frame.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Splits a chunked byte stream into trimmed, non-empty lines.
///
/// Bytes after the last newline are held back until the next chunk, so a line
/// (or a multi-byte character) cut by a chunk boundary is rebuilt intact.
#[derive(Debug, Default)]
pub struct LineDecoder {
    carry: Vec<u8>,
    /// Set while skipping the rest of an oversized line.
    overflowed: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        let mut rest = chunk;
        while let Some(newline) = rest.iter().position(|b| *b == b'\n') {
            out.extend(self.take_line(&rest[..newline]));
            rest = &rest[newline + 1..];
        }
        self.hold(rest);
        out
    }

    /// Flushes whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        self.take_line(&[])
    }

    fn take_line(&mut self, tail: &[u8]) -> Option<String> {
        self.hold(tail);
        let line = if self.overflowed { None } else { clean_line(&self.carry) };
        self.carry.clear();
        self.overflowed = false;
        line
    }

    fn hold(&mut self, bytes: &[u8]) {
        if self.overflowed {
            return;
        }
        if self.carry.len() + bytes.len() > MAX_LINE_BYTES {
            debug!(
                "{}",
                RelayError::MalformedFrame(format!("line longer than {} bytes dropped", MAX_LINE_BYTES))
            );
            self.carry = Vec::new();
            self.overflowed = true;
            return;
        }
        self.carry.extend_from_slice(bytes);
    }
}

fn clean_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLine<'a> {
    Done,
    Payload(&'a str),
}

/// Classifies a decoded line. Lines without the `data:` prefix are not events.
pub fn parse_data_line(line: &str) -> Option<DataLine<'_>> {
    let rest = line.strip_prefix(DATA_PREFIX)?;
    let payload = rest.strip_prefix(' ').unwrap_or(rest).trim();
    if payload == DONE_SENTINEL {
        Some(DataLine::Done)
    } else if payload.is_empty() {
        None
    } else {
        Some(DataLine::Payload(payload))
    }
}

/// Adapts a byte stream into a lazy stream of decoded lines.
///
/// A read error is yielded in place and ends the sequence.
pub fn lines<S>(bytes: S) -> impl Stream<Item = Result<String>> + Send
    where S: Stream<Item = Result<Bytes>> + Send + Unpin
{
    futures::stream::unfold(
        (bytes, LineDecoder::new(), std::collections::VecDeque::new(), false),
        |(mut bytes, mut decoder, mut ready, mut finished)| async move {
            loop {
                if let Some(line) = ready.pop_front() {
                    return Some((Ok(line), (bytes, decoder, ready, finished)));
                }
                if finished {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => ready.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        finished = true;
                        return Some((Err(e), (bytes, decoder, ready, finished)));
                    }
                    None => {
                        finished = true;
                        ready.extend(decoder.finish());
                    }
                }
            }
        }
    )
}
