//! Streaming responses.
//!
//! A streaming call spawns one pump task that owns the HTTP response body.
//! The pump reads the body line by line, decodes every `data:` line into a
//! [`StreamEvent`] and forwards it over a bounded channel until the
//! `[DONE]` sentinel, the end of the body, or the first failure.
//!
//! ```text
//! Connecting ──2xx──▶ Streaming ──[DONE] / EOF──▶ Completed
//!     │                   │
//!     └──non-2xx──────────┴──decode / read error / cancel──▶ Failed
//! ```
//!
//! The channel carries `Ok(event)` items in wire order. A failed stream ends
//! with exactly one `Err` item; a completed one simply closes.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::response::StreamEvent;
use crate::transport::Transport;

pub use tokio::sync::mpsc::error::TryRecvError;

/// Events buffered between the pump and the consumer before the pump stalls.
pub const EVENT_BUFFER: usize = 16;

/// Longest line the pump accepts before giving up on the stream.
pub const MAX_LINE_LEN: usize = 1024 * 1024;

/// Prefix of lines that carry an event.
const DATA_PREFIX: &str = "data:";

/// Payload marking the normal end of the stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Lifecycle of a streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Request sent, waiting for the status line.
    Connecting,
    /// 2xx received, reading events.
    Streaming,
    /// Sentinel or end of body reached without error.
    Completed,
    /// Stopped after emitting one error.
    Failed,
}

impl StreamState {
    /// `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Failed)
    }
}

/// Handle to a running streaming call.
///
/// Dropping the handle stops the pump and releases the connection.
pub struct ResponseStream {
    events: mpsc::Receiver<Result<StreamEvent>>,
    state: watch::Receiver<StreamState>,
}

impl ResponseStream {
    /// Start the pump for an already encoded request body.
    pub(crate) fn spawn(transport: Transport, body: Vec<u8>, cancel: CancellationToken) -> Self {
        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state) = watch::channel(StreamState::Connecting);

        tokio::spawn(async move {
            let pump = Pump {
                tx,
                state: state_tx,
                cancel,
            };
            pump.run(transport, body).await;
        });

        Self { events, state }
    }

    /// A stream that failed before any request was sent.
    pub(crate) fn failed(error: Error) -> Self {
        let (tx, events) = mpsc::channel(1);
        let (_, state) = watch::channel(StreamState::Failed);
        // Capacity is one and the receiver is alive, so this cannot fail.
        let _ = tx.try_send(Err(error));
        Self { events, state }
    }

    /// Wait for the next event. `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Result<StreamEvent>> {
        self.events.recv().await
    }

    /// Take the next event if one is ready, without waiting.
    ///
    /// `Err(TryRecvError::Empty)` means the stream is still running,
    /// `Err(TryRecvError::Disconnected)` that it has ended.
    pub fn try_recv(&mut self) -> std::result::Result<Result<StreamEvent>, TryRecvError> {
        self.events.try_recv()
    }

    /// Current lifecycle state of the pump.
    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.state.clone()
    }

    /// Drain the stream, concatenating the content of every delta.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(event) = self.recv().await {
            text.push_str(event?.text());
        }
        Ok(text)
    }

    /// Split into an event channel and an error channel.
    ///
    /// The error channel yields at most one error and closes after the event
    /// channel. Both must be drained concurrently (e.g. with
    /// `tokio::select!`), since the pump stalls while the event channel is
    /// full.
    pub fn into_channels(mut self) -> (mpsc::Receiver<StreamEvent>, mpsc::Receiver<Error>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (error_tx, error_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            while let Some(item) = self.events.recv().await {
                match item {
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        drop(event_tx);
                        let _ = error_tx.send(e).await;
                        return;
                    }
                }
            }
        });

        (event_rx, error_rx)
    }
}

impl Stream for ResponseStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pump
// ─────────────────────────────────────────────────────────────────────────────

/// How a pump run ended without an error to report.
enum Exit {
    /// Sentinel or end of body.
    Completed,
    /// The consumer dropped the handle.
    Abandoned,
}

struct Pump {
    tx: mpsc::Sender<Result<StreamEvent>>,
    state: watch::Sender<StreamState>,
    cancel: CancellationToken,
}

impl Pump {
    async fn run(self, transport: Transport, body: Vec<u8>) {
        match self.pump(transport, body).await {
            Ok(Exit::Completed) => {
                self.state.send_replace(StreamState::Completed);
                tracing::debug!("Agent stream completed");
            }
            Ok(Exit::Abandoned) => {
                self.state.send_replace(StreamState::Failed);
                tracing::debug!("Agent stream dropped by consumer");
            }
            Err(e) => {
                self.state.send_replace(StreamState::Failed);
                tracing::debug!(error = %e, "Agent stream failed");
                let _ = self.tx.send(Err(e)).await;
            }
        }
        // Dropping `self.tx` here closes the channel.
    }

    async fn pump(&self, transport: Transport, body: Vec<u8>) -> Result<Exit> {
        let response = transport.post(body, &self.cancel).await?;
        self.state.send_replace(StreamState::Streaming);

        let mut chunks = Box::pin(response.bytes_stream());
        let mut lines = LineBuffer::default();
        let mut emitted = 0usize;

        loop {
            while let Some(line) = lines.next_line()? {
                match parse_line(&line)? {
                    Some(Frame::Done) => {
                        tracing::debug!(events = emitted, "Received stream sentinel");
                        return Ok(Exit::Completed);
                    }
                    Some(Frame::Event(event)) => {
                        if !self.emit(event).await? {
                            return Ok(Exit::Abandoned);
                        }
                        emitted += 1;
                    }
                    None => {}
                }
            }

            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                chunk = chunks.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => lines.push(&bytes),
                Some(Err(e)) => return Err(Error::Http(e)),
                None => break,
            }
        }

        // A final line without a trailing newline still counts.
        if let Some(line) = lines.finish() {
            match parse_line(&line)? {
                Some(Frame::Event(event)) => {
                    if !self.emit(event).await? {
                        return Ok(Exit::Abandoned);
                    }
                }
                Some(Frame::Done) | None => {}
            }
        }

        Ok(Exit::Completed)
    }

    /// Hand one event to the consumer. `Ok(false)` if the consumer is gone.
    async fn emit(&self, event: StreamEvent) -> Result<bool> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            sent = self.tx.send(Ok(event)) => Ok(sent.is_ok()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Line protocol
// ─────────────────────────────────────────────────────────────────────────────

/// A meaningful line of the event stream.
#[derive(Debug)]
enum Frame {
    Event(StreamEvent),
    Done,
}

/// Interpret one line. `Ok(None)` for lines that carry no event
/// (blank lines, comments, other SSE fields).
fn parse_line(line: &str) -> Result<Option<Frame>> {
    let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };
    let payload = payload.trim();

    if payload == DONE_SENTINEL {
        return Ok(Some(Frame::Done));
    }

    match serde_json::from_str(payload) {
        Ok(event) => Ok(Some(Frame::Event(event))),
        Err(e) => {
            tracing::warn!(data = %payload, error = %e, "Failed to parse stream event");
            Err(Error::decode(e, payload.to_string()))
        }
    }
}

/// Splits a chunked byte stream into lines.
///
/// Bytes are buffered until a newline arrives, so multi-byte characters and
/// lines split across chunks are reassembled before decoding. Each byte is
/// scanned once; consumed lines are compacted away on the next push.
#[derive(Debug, Default)]
struct LineBuffer {
    buf: Vec<u8>,
    /// Start of the first unconsumed line.
    start: usize,
    /// Bytes before this offset are known to hold no newline.
    scanned: usize,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// The next complete line, without its `\n`.
    ///
    /// Fails once a line grows past [`MAX_LINE_LEN`].
    fn next_line(&mut self) -> Result<Option<String>> {
        match self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.scanned + offset;
                let line = &self.buf[self.start..end];
                if line.len() > MAX_LINE_LEN {
                    return Err(line_too_long(line));
                }
                let line = String::from_utf8_lossy(line).into_owned();
                self.start = end + 1;
                self.scanned = self.start;
                Ok(Some(line))
            }
            None => {
                self.scanned = self.buf.len();
                let pending = &self.buf[self.start..];
                if pending.len() > MAX_LINE_LEN {
                    return Err(line_too_long(pending));
                }
                Ok(None)
            }
        }
    }

    /// Whatever is left after the body ended.
    fn finish(&mut self) -> Option<String> {
        let rest = &self.buf[self.start..];
        if rest.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(rest).into_owned();
        self.buf.clear();
        self.start = 0;
        self.scanned = 0;
        Some(line)
    }
}

fn line_too_long(line: &[u8]) -> Error {
    tracing::warn!(len = line.len(), "Stream line exceeds maximum length");
    let source = <serde_json::Error as serde::de::Error>::custom(format!(
        "line of {} bytes exceeds the {} byte limit",
        line.len(),
        MAX_LINE_LEN
    ));
    Error::decode(source, line.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_line_buffer_reassembles_split_lines() {
        let mut lines = LineBuffer::default();
        lines.push(b"data: {\"id\":");
        assert!(lines.next_line().unwrap().is_none());

        lines.push(b"\"a\"}\r\ndata: [DO");
        assert_eq!(
            lines.next_line().unwrap().as_deref(),
            Some("data: {\"id\":\"a\"}\r")
        );
        assert!(lines.next_line().unwrap().is_none());

        lines.push(b"NE]");
        assert_eq!(lines.finish().as_deref(), Some("data: [DONE]"));
        assert!(lines.finish().is_none());
    }

    #[test]
    fn test_line_buffer_keeps_multibyte_chars_across_chunks() {
        let text = "data: 你好\n".as_bytes();
        let mut lines = LineBuffer::default();
        // Split inside the first character.
        lines.push(&text[..7]);
        lines.push(&text[7..]);
        assert_eq!(lines.next_line().unwrap().as_deref(), Some("data: 你好"));
    }

    #[test]
    fn test_line_buffer_several_lines_per_chunk() {
        let mut lines = LineBuffer::default();
        lines.push(b"a\nb\nc");
        assert_eq!(lines.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(lines.next_line().unwrap().as_deref(), Some("b"));
        assert!(lines.next_line().unwrap().is_none());

        lines.push(b"d\n");
        assert_eq!(lines.next_line().unwrap().as_deref(), Some("cd"));
        assert!(lines.next_line().unwrap().is_none());
        assert!(lines.finish().is_none());
    }

    #[test]
    fn test_line_buffer_long_line_in_many_chunks() {
        let mut lines = LineBuffer::default();
        lines.push(b"data: ");
        for _ in 0..1000 {
            lines.push(&[b'x'; 100]);
            assert!(lines.next_line().unwrap().is_none());
        }
        lines.push(b"\n");
        let line = lines.next_line().unwrap().unwrap();
        assert_eq!(line.len(), "data: ".len() + 100_000);
    }

    #[test]
    fn test_line_buffer_rejects_oversized_line() {
        let mut lines = LineBuffer::default();
        let chunk = vec![b'x'; 64 * 1024];
        let mut result = Ok(None);
        for _ in 0..(MAX_LINE_LEN / chunk.len() + 1) {
            lines.push(&chunk);
            result = lines.next_line();
            if result.is_err() {
                break;
            }
        }

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("byte limit"));
    }

    #[test]
    fn test_parse_line_event() {
        let frame = parse_line(r#"data: {"id":"x","choices":[{"delta":{"content":"hi"}}]}"#)
            .unwrap()
            .unwrap();
        match frame {
            Frame::Event(event) => {
                assert_eq!(event.id, "x");
                assert_eq!(event.text(), "hi");
            }
            Frame::Done => panic!("expected event"),
        }
    }

    #[test]
    fn test_parse_line_sentinel_with_whitespace() {
        assert!(matches!(parse_line("  data:[DONE]  \r"), Ok(Some(Frame::Done))));
        assert!(matches!(parse_line("data: [DONE]"), Ok(Some(Frame::Done))));
    }

    #[test]
    fn test_parse_line_ignores_non_data_lines() {
        for line in ["", "   ", ": keep-alive", "event: message", "id: 7", "retry: 100"] {
            assert!(parse_line(line).unwrap().is_none(), "line {line:?}");
        }
    }

    #[test]
    fn test_parse_line_bad_json_is_decode_error() {
        let err = parse_line("data: {not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        match err {
            Error::Decode { body, .. } => assert_eq!(&body[..], b"{not json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_stream_yields_one_error() {
        let mut stream = ResponseStream::failed(Error::StreamingSession);
        assert_eq!(stream.state(), StreamState::Failed);
        assert!(matches!(stream.recv().await, Some(Err(Error::StreamingSession))));
        assert!(stream.recv().await.is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!StreamState::Connecting.is_terminal());
        assert!(!StreamState::Streaming.is_terminal());
        assert!(StreamState::Completed.is_terminal());
        assert!(StreamState::Failed.is_terminal());
    }
}
