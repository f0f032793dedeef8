//! Stream frame decoder.
//!
//! Contract:
//! - Input byte chunks arrive at arbitrary granularity: a JSON record may be
//!   split across chunks, or several records may share one chunk.
//! - Every complete line (text preceding a `\n`, `\r\n` tolerated) that is
//!   non-empty after trimming is emitted as one JSON frame, in order.
//! - A non-empty line that is not valid JSON ends the stream with
//!   `MalformedFrame`; no further frames are emitted after that.
//! - A trailing partial line with no newline is discarded at end of stream:
//!   it represents a truncated final write and is not actionable.
//!
//! Buffering is done on bytes, not text, so a chunk boundary inside a
//! multi-byte UTF-8 sequence never corrupts a frame (`\n` cannot occur inside
//! a multi-byte sequence).

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::stream::Stream;

use crate::error::{ChatProxyError, CoreResult};

/// Boxed stream of raw body chunks, transport errors already mapped.
pub type ByteStream = Pin<Box<dyn Stream<Item = CoreResult<Bytes>> + Send>>;

pub struct FrameDecoder {
    inner: Option<ByteStream>,
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new(inner: ByteStream) -> Self {
        Self {
            inner: Some(inner),
            buf: BytesMut::new(),
        }
    }

    /// Pop the next complete line out of the buffer, skipping blank lines.
    fn next_line(&mut self) -> Option<String> {
        while let Some(idx) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line = self.buf.split_to(idx + 1);
            line.truncate(idx);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        None
    }

    /// Drop the reader and whatever was buffered. Called on every
    /// terminal path so the underlying connection is released exactly once.
    fn fuse(&mut self) {
        self.inner = None;
        self.buf.clear();
    }

    fn decode_line(&mut self, line: String) -> CoreResult<serde_json::Value> {
        match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value) => Ok(value),
            Err(_) => {
                self.fuse();
                Err(ChatProxyError::MalformedFrame { line })
            }
        }
    }
}

impl Stream for FrameDecoder {
    type Item = CoreResult<serde_json::Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(line) = self.next_line() {
                return Poll::Ready(Some(self.decode_line(line)));
            }

            let Some(inner) = self.inner.as_mut() else {
                return Poll::Ready(None);
            };
            match inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buf.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.fuse();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    // Trailing bytes without a newline are a truncated final
                    // write; discard them silently.
                    self.fuse();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
