use std::collections::VecDeque;

use futures_util::Stream;
use memchr::memchr;

use crate::error::AdapterError;
use crate::protocol::openai_chat::OpenAiChatResponse;

const DONE_SENTINEL: &str = "[DONE]";

/// One meaningful line of an SSE body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Payload of a `data:` line.
    Data(String),
    /// `data: [DONE]`.
    Done,
}

// ---------------------------------------------------------------------------
// SseLineDecoder: incremental line splitter
// ---------------------------------------------------------------------------

/// Incremental `data:` line decoder.
///
/// Bytes may arrive split at arbitrary boundaries, including inside a
/// multi-byte UTF-8 sequence or inside a line; both are carried over to the
/// next [`feed`](Self::feed). Lines other than `data:` are ignored.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: String,
    remainder: Vec<u8>,
}

impl SseLineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes` and append every complete line to `out`.
    pub fn feed(&mut self, bytes: &[u8], out: &mut VecDeque<SseLine>) {
        self.push_utf8(bytes);

        let mut consumed = 0;
        while let Some(rel) = memchr(b'\n', &self.buffer.as_bytes()[consumed..]) {
            let line_end = consumed + rel;
            process_line(&self.buffer[consumed..line_end], out);
            consumed = line_end + 1;
        }
        if consumed == self.buffer.len() {
            self.buffer.clear();
        } else if consumed > 0 {
            self.buffer.drain(..consumed);
        }
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self, out: &mut VecDeque<SseLine>) {
        if !self.remainder.is_empty() {
            self.buffer
                .push_str(&String::from_utf8_lossy(&self.remainder));
            self.remainder.clear();
        }
        let rest = std::mem::take(&mut self.buffer);
        process_line(&rest, out);
    }

    fn push_utf8(&mut self, bytes: &[u8]) {
        self.remainder.extend_from_slice(bytes);
        loop {
            match std::str::from_utf8(&self.remainder) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.remainder.clear();
                    return;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    self.buffer.push_str(
                        std::str::from_utf8(&self.remainder[..valid_up_to]).unwrap_or_default(),
                    );
                    match err.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.remainder.drain(..valid_up_to);
                            return;
                        }
                        Some(invalid_len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.remainder.drain(..valid_up_to + invalid_len);
                        }
                    }
                }
            }
        }
    }
}

fn process_line(line: &str, out: &mut VecDeque<SseLine>) {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let Some(payload) = line.strip_prefix("data:") else {
        return;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim() == DONE_SENTINEL {
        out.push_back(SseLine::Done);
    } else if !payload.trim().is_empty() {
        out.push_back(SseLine::Data(payload.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Stream utility
// ---------------------------------------------------------------------------

/// Turn an HTTP body byte stream into decoded wire chunks.
///
/// The sequence ends at the first `data: [DONE]` line, even when more
/// bytes are buffered, or when the body ends. A `data:` payload that is not
/// a valid chunk is skipped. A body read error is yielded once and ends the
/// sequence. The byte stream is dropped on every exit path.
pub fn wire_chunk_stream<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<OpenAiChatResponse, AdapterError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    use futures_util::StreamExt;

    futures_util::stream::unfold(
        (
            Box::pin(byte_stream),
            SseLineDecoder::new(),
            VecDeque::<SseLine>::with_capacity(8),
            false,
        ),
        |(mut stream, mut decoder, mut pending, mut eof)| async move {
            loop {
                while let Some(line) = pending.pop_front() {
                    match line {
                        SseLine::Done => return None,
                        SseLine::Data(payload) => {
                            match serde_json::from_str::<OpenAiChatResponse>(&payload) {
                                Ok(chunk) => {
                                    return Some((Ok(chunk), (stream, decoder, pending, eof)));
                                }
                                Err(err) => {
                                    tracing::debug!(error = %err, payload_len = payload.len(), "skipping malformed stream chunk");
                                }
                            }
                        }
                    }
                }
                if eof {
                    return None;
                }

                match stream.as_mut().next().await {
                    Some(Ok(bytes)) => decoder.feed(&bytes, &mut pending),
                    Some(Err(err)) => {
                        pending.clear();
                        let err = AdapterError::Transport(format!("stream read failed: {err}"));
                        return Some((Err(err), (stream, decoder, pending, true)));
                    }
                    None => {
                        decoder.finish(&mut pending);
                        eof = true;
                    }
                }
            }
        },
    )
}
