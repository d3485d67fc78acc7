//! Newline-delimited JSON framing for streaming generate/chat bodies.
//!
//! The backend writes one JSON object per line, but network chunks do not
//! respect line boundaries, so bytes are buffered until a full line exists.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::inference::{FragmentStream, InferenceError};

/// Accumulates raw bytes and hands back complete, non-empty lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to hold no newline.
    scanned: usize,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let text = String::from_utf8_lossy(&self.pending[start..end]);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
            start = end + 1;
            self.scanned = start;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();
        lines
    }

    /// Returns whatever is left once the body has ended without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        self.scanned = 0;
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// What one decoded line means for the fragment stream.
#[derive(Debug, PartialEq)]
pub enum StreamLine {
    Fragment(String),
    /// Terminal marker. Some backends put the last text on the done line.
    Done(Option<String>),
    Error(String),
    /// Undecodable line; skipped like the reference client did.
    Skip,
}

#[derive(Debug, Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
}

pub fn decode_generate_line(line: &str) -> StreamLine {
    match serde_json::from_str::<GenerateLine>(line) {
        Ok(GenerateLine {
            error: Some(message),
            ..
        }) => StreamLine::Error(message),
        Ok(GenerateLine {
            response,
            done: true,
            ..
        }) => StreamLine::Done(response.filter(|r| !r.is_empty())),
        Ok(GenerateLine { response, .. }) => StreamLine::Fragment(response.unwrap_or_default()),
        Err(_) => StreamLine::Skip,
    }
}

pub fn decode_chat_line(line: &str) -> StreamLine {
    match serde_json::from_str::<ChatLine>(line) {
        Ok(ChatLine {
            error: Some(message),
            ..
        }) => StreamLine::Error(message),
        Ok(ChatLine {
            message, done: true, ..
        }) => StreamLine::Done(message.map(|m| m.content).filter(|c| !c.is_empty())),
        Ok(ChatLine { message, .. }) => {
            StreamLine::Fragment(message.map(|m| m.content).unwrap_or_default())
        }
        Err(_) => StreamLine::Skip,
    }
}

type ByteSource = Pin<Box<dyn Stream<Item = Result<Bytes, InferenceError>> + Send>>;

struct FrameState {
    source: ByteSource,
    buffer: LineBuffer,
    ready: VecDeque<String>,
    decode: fn(&str) -> StreamLine,
    status: u16,
    saw_done: bool,
    finished: bool,
}

/// Turns a raw NDJSON body into a stream of text fragments.
///
/// Empty fragments are dropped. The stream ends at the `done` marker or at the
/// first error (transport or in-band). A body that ends before `done` yields a
/// final `Malformed` error, since the reply was cut off.
pub fn frame_fragments<S>(source: S, status: u16, decode: fn(&str) -> StreamLine) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, InferenceError>> + Send + 'static,
{
    let state = FrameState {
        source: Box::pin(source),
        buffer: LineBuffer::default(),
        ready: VecDeque::new(),
        decode,
        status,
        saw_done: false,
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(line) = state.ready.pop_front() {
                match (state.decode)(&line) {
                    StreamLine::Fragment(text) if text.is_empty() => continue,
                    StreamLine::Fragment(text) => return Some((Ok(text), state)),
                    StreamLine::Done(tail) => {
                        state.saw_done = true;
                        state.finished = true;
                        return tail.map(|text| (Ok(text), state));
                    }
                    StreamLine::Error(message) => {
                        state.finished = true;
                        let status = state.status;
                        return Some((Err(InferenceError::Backend { status, message }), state));
                    }
                    StreamLine::Skip => continue,
                }
            }

            match state.source.next().await {
                Some(Ok(bytes)) => {
                    let lines = state.buffer.push(&bytes);
                    state.ready.extend(lines);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => match state.buffer.finish() {
                    Some(line) => state.ready.push_back(line),
                    None => {
                        state.finished = true;
                        if state.saw_done {
                            return None;
                        }
                        let error = InferenceError::Malformed(
                            "stream ended before done marker".to_string(),
                        );
                        return Some((Err(error), state));
                    }
                },
            }
        }
    }))
}
