//! Server-sent events decoding.
//!
//! Only `data:` fields matter to the backends; event names, ids and
//! comments are skipped. Multi-line data fields are joined with `\n`.

use crate::error::ProviderError;
use crate::http_client::ByteStream;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use std::collections::VecDeque;

/// Incremental decoder turning body chunks into `data:` payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feeds a chunk and returns the payloads of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            self.handle_line(line, &mut events);
        }
        events
    }

    /// Flushes whatever is left once the body ends.
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
            self.handle_line(&line, &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
    }

    fn dispatch(&mut self, events: &mut Vec<String>) {
        if !self.data.is_empty() {
            events.push(self.data.join("\n"));
            self.data.clear();
        }
    }
}

struct EventState {
    bytes: ByteStream,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    done: bool,
}

/// Adapts a body stream into a stream of `data:` payloads.
pub fn events(bytes: ByteStream) -> BoxStream<'static, Result<String, ProviderError>> {
    let state = EventState {
        bytes,
        decoder: SseDecoder::default(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let decoded = state.decoder.push(&chunk);
                    state.ready.extend(decoded);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    let decoded = state.decoder.finish();
                    state.ready.extend(decoded);
                }
            }
        }
    })
    .boxed()
}
