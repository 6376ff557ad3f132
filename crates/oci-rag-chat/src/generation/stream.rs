//! Incremental response delivery
//!
//! `ResponseStream` is a finite, non-restartable stream of text fragments.
//! Dropping it or calling [`ResponseStream::cancel`] releases the underlying
//! HTTP body.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{Error, Result};

type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Fragments of a model answer, in emission order
pub struct ResponseStream {
    inner: Option<FragmentStream>,
}

impl ResponseStream {
    /// Wrap any fragment stream
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        Self {
            inner: Some(Box::pin(stream)),
        }
    }

    /// Stream over already-known fragments
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures_util::stream::iter(fragments.into_iter().map(Ok)))
    }

    /// Await the next fragment
    pub async fn next_fragment(&mut self) -> Option<Result<String>> {
        self.next().await
    }

    /// Stop consuming and release the connection
    pub fn cancel(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!("Response stream cancelled");
        }
    }

    /// True once the stream is exhausted or cancelled
    pub fn is_finished(&self) -> bool {
        self.inner.is_none()
    }

    /// Concatenate all remaining fragments
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for ResponseStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                this.inner = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Server-Sent Events decoder
///
/// Accepts arbitrary byte chunks and yields the `data` payload of each
/// complete event. Lines split across chunks are reassembled.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning payloads of events completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            self.handle_line(line, &mut events);
        }

        events
    }

    /// Flush an event left open at end of input
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            self.handle_line(line.trim_end_matches('\r'), &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            self.dispatch(events);
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        // comments (":") and event/id/retry fields carry no text
    }

    fn dispatch(&mut self, events: &mut Vec<String>) {
        if !self.data.is_empty() {
            events.push(self.data.join("\n"));
            self.data.clear();
        }
    }
}

/// What one SSE payload means to the fragment stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Text to deliver
    Fragment(String),
    /// Event carrying no text, e.g. an empty delta
    Ignore,
    /// Terminal event; anything after it is discarded
    Finished,
}

/// Turn an SSE byte stream into a fragment stream
///
/// `parse` classifies each event payload. The stream ends cleanly only after
/// an [`SseEvent::Finished`] event; if the body ends before one arrives the
/// last item is an `Error::Llm`. The first error ends the stream.
pub fn sse_fragments<S, F>(bytes: S, parse: F) -> ResponseStream
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
    F: FnMut(&str) -> Result<SseEvent> + Send + 'static,
{
    struct State<S, F> {
        bytes: Pin<Box<S>>,
        decoder: SseDecoder,
        pending: VecDeque<String>,
        parse: F,
        eof: bool,
        done: bool,
    }

    let state = State {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        parse,
        eof: false,
        done: false,
    };

    let stream = futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }

            if let Some(payload) = state.pending.pop_front() {
                match (state.parse)(&payload) {
                    Ok(SseEvent::Fragment(fragment)) => return Some((Ok(fragment), state)),
                    Ok(SseEvent::Ignore) => continue,
                    Ok(SseEvent::Finished) => {
                        state.done = true;
                        return None;
                    }
                    Err(e) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
            }

            if state.eof {
                state.done = true;
                return Some((
                    Err(Error::Llm(
                        "Stream ended before the completion event".to_string(),
                    )),
                    state,
                ));
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.eof = true;
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                }
            }
        }
    });

    ResponseStream::new(stream)
}
