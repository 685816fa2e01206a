//! Line framing for streamed upstream responses.
//!
//! Upstream bodies arrive as arbitrary transport chunks. [`LineAssembler`]
//! turns them into complete lines, and a [`FrameDecoder`] strategy decides
//! what each line means for a given provider. Lines that are not valid
//! payloads (keepalives, comments, partial garbage) are skipped silently.

use super::types::LLMError;
use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::{BoxStream, Stream};
use serde_json::Value;
use tracing::{trace, warn};

/// Meaning of one decoded line
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Payload(Value),
    /// Terminal marker; nothing after it is read
    Done,
    /// Noise to be ignored
    Skip,
}

/// Per-provider framing strategy.
pub trait FrameDecoder: Send + Sync + 'static {
    fn decode_line(&self, line: &str) -> Frame;
}

/// Server-sent events: `data: {json}` lines and a `[DONE]` terminal marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SseDecoder;

impl FrameDecoder for SseDecoder {
    fn decode_line(&self, line: &str) -> Frame {
        let Some(data) = line.trim().strip_prefix("data:") else {
            return Frame::Skip;
        };
        let data = data.trim_start();
        if data.starts_with("[DONE]") {
            return Frame::Done;
        }
        serde_json::from_str(data)
            .map(Frame::Payload)
            .unwrap_or(Frame::Skip)
    }
}

/// Newline-delimited JSON: one bare JSON document per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdjsonDecoder;

impl FrameDecoder for NdjsonDecoder {
    fn decode_line(&self, line: &str) -> Frame {
        serde_json::from_str(line.trim())
            .map(Frame::Payload)
            .unwrap_or(Frame::Skip)
    }
}

/// Buffers bytes until a full line is available.
///
/// Works on raw bytes so a multi-byte character split across two transport
/// chunks is decoded intact.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
}

impl LineAssembler {
    /// Append a transport chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Trailing text left when the body ended without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

/// Decode a byte stream into typed items.
///
/// `extract` maps each JSON payload to an item, returning `None` for frames
/// that carry nothing useful. A transport error ends the sequence with a
/// single trailing `UpstreamUnreachable`. Dropping the returned stream drops
/// the byte stream, which closes the upstream connection.
pub fn decode_stream<S, D, T, F>(
    bytes: S,
    decoder: D,
    mut extract: F,
) -> BoxStream<'static, Result<T, LLMError>>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    D: FrameDecoder,
    T: Send + 'static,
    F: FnMut(Value) -> Option<T> + Send + 'static,
{
    let mut bytes = Box::pin(bytes);

    let frames = stream! {
        let mut assembler = LineAssembler::default();
        let mut done = false;

        while !done {
            let chunk = match bytes.next().await {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    warn!("Upstream stream truncated: {}", e);
                    yield Err(LLMError::UpstreamUnreachable(e.to_string()));
                    return;
                }
                None => break,
            };

            for line in assembler.push(&chunk) {
                match decoder.decode_line(&line) {
                    Frame::Payload(value) => {
                        if let Some(item) = extract(value) {
                            yield Ok(item);
                        }
                    }
                    Frame::Done => {
                        done = true;
                        break;
                    }
                    Frame::Skip => trace!("Skipping frame: {}", line),
                }
            }
        }

        let tail = if done { None } else { assembler.finish() };
        if let Some(line) = tail {
            if let Frame::Payload(value) = decoder.decode_line(&line) {
                if let Some(item) = extract(value) {
                    yield Ok(item);
                }
            }
        }
    };

    frames.boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn byte_stream(parts: Vec<&'static str>) -> impl Stream<Item = reqwest::Result<Bytes>> {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))))
    }

    #[test]
    fn test_sse_decoder() {
        let decoder = SseDecoder;
        assert_eq!(
            decoder.decode_line(r#"data: {"a":1}"#),
            Frame::Payload(serde_json::json!({"a": 1}))
        );
        assert_eq!(decoder.decode_line("data: [DONE]"), Frame::Done);
        assert_eq!(decoder.decode_line(": keepalive"), Frame::Skip);
        assert_eq!(decoder.decode_line("event: ping"), Frame::Skip);
        assert_eq!(decoder.decode_line("data: {not json"), Frame::Skip);
    }

    #[test]
    fn test_ndjson_decoder() {
        let decoder = NdjsonDecoder;
        assert_eq!(
            decoder.decode_line(r#"{"status":"pulling"}"#),
            Frame::Payload(serde_json::json!({"status": "pulling"}))
        );
        assert_eq!(decoder.decode_line("garbage"), Frame::Skip);
    }

    #[test]
    fn test_line_assembler_joins_split_frames() {
        let mut assembler = LineAssembler::default();
        assert!(assembler.push(b"data: {\"a\"").is_empty());
        assert_eq!(assembler.push(b":1}\r\n\r\ndata: x"), vec!["data: {\"a\":1}"]);
        assert_eq!(assembler.finish(), Some("data: x".to_string()));
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn test_line_assembler_keeps_split_utf8() {
        let mut assembler = LineAssembler::default();
        let text = "héllo\n".as_bytes();
        assert!(assembler.push(&text[..2]).is_empty());
        assert_eq!(assembler.push(&text[2..]), vec!["héllo"]);
    }

    #[tokio::test]
    async fn test_decode_stream_skips_noise_and_stops_at_done() {
        let bytes = byte_stream(vec![
            ": keepalive\n",
            "data: {\"n\":1}\n",
            "data: {broken\n",
            "data: {\"n\"",
            ":2}\n",
            "data: [DONE]\n",
            "data: {\"n\":3}\n",
        ]);

        let items: Vec<i64> = decode_stream(bytes, SseDecoder, |v| v["n"].as_i64())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_decode_stream_reads_unterminated_tail() {
        let bytes = byte_stream(vec!["{\"n\":1}\n{\"n\":2}"]);
        let items: Vec<i64> = decode_stream(bytes, NdjsonDecoder, |v| v["n"].as_i64())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_extract_filters_payloads() {
        let bytes = byte_stream(vec!["{\"n\":1}\n{\"other\":true}\n{\"n\":3}\n"]);
        let items: Vec<i64> = decode_stream(bytes, NdjsonDecoder, |v| v["n"].as_i64())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec![1, 3]);
    }
}
