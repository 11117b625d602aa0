use tracing::{debug, warn};

use crate::event::StreamEvent;

/// Buffering decoder for the blank-line-delimited execution stream.
///
/// Chunks are consumed in arrival order and never assumed to align with
/// record boundaries; decoded events come out in the exact order their
/// records appeared in the byte stream.
#[derive(Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport chunk and returns all events whose records are
    /// now complete. The trailing remainder stays buffered for the next
    /// chunk.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((idx, delim_len)) = find_record_delimiter(&self.buf) {
            let record = self.buf[..idx].to_vec();
            self.buf.drain(..idx + delim_len);
            if let Some(event) = parse_record(&record) {
                events.push(event);
            }
        }
        events
    }

    /// Consumes the decoder at end of stream, discarding any incomplete
    /// trailing record.
    pub fn finish(self) {
        if !self.buf.is_empty() {
            debug!(
                len = self.buf.len(),
                "discarding incomplete record at end of stream"
            );
        }
    }
}

fn find_record_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len()
            && buf[i] == b'\r'
            && buf[i + 1] == b'\n'
            && buf[i + 2] == b'\r'
            && buf[i + 3] == b'\n'
        {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn parse_record(bytes: &[u8]) -> Option<StreamEvent> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            let payload = rest.trim_start();
            if payload.is_empty() {
                return None;
            }
            return StreamEvent::decode_payload(payload);
        }
    }
    warn!("dropping stream record without a data line");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = concat!(
        "data: {\"type\":\"html_chunk\",\"content\":\"<p>one</p>\"}\n\n",
        "data: {\"type\":\"markdown_update\",\"container_id\":\"md-1\",\"content\":\"A\"}\n\n",
        "data: {\"type\":\"complete\",\"html_result\":\"<p>ok</p>\"}\n\n",
    );

    fn decode_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<StreamEvent> {
        decoder.push_chunk(bytes)
    }

    #[test]
    fn event_sequence_is_independent_of_chunk_boundaries() {
        let mut whole = FrameDecoder::new();
        let all_at_once = decode_all(&mut whole, SAMPLE.as_bytes());

        let mut byte_wise = FrameDecoder::new();
        let mut one_at_a_time = Vec::new();
        for byte in SAMPLE.as_bytes() {
            one_at_a_time.extend(byte_wise.push_chunk(std::slice::from_ref(byte)));
        }

        assert_eq!(all_at_once.len(), 3);
        assert_eq!(all_at_once, one_at_a_time);
    }

    #[test]
    fn invalid_json_record_is_skipped_and_stream_continues() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push_chunk(
            b"data: {not json\n\ndata: {\"type\":\"text_chunk\",\"content\":\"still here\"}\n\n",
        );
        assert_eq!(
            events,
            vec![StreamEvent::TextChunk {
                content: "still here".into()
            }]
        );
    }

    #[test]
    fn record_split_across_chunks_is_buffered() {
        let mut decoder = FrameDecoder::new();
        assert!(
            decoder
                .push_chunk(b"data: {\"type\":\"text_chunk\",\"content\":\"hel")
                .is_empty()
        );
        let events = decoder.push_chunk(b"lo\"}\n\n");
        assert_eq!(
            events,
            vec![StreamEvent::TextChunk {
                content: "hello".into()
            }]
        );
    }

    #[test]
    fn crlf_delimited_records_decode() {
        let mut decoder = FrameDecoder::new();
        let events =
            decoder.push_chunk(b"data: {\"type\":\"html_chunk\",\"content\":\"x\"}\r\n\r\n");
        assert_eq!(
            events,
            vec![StreamEvent::HtmlChunk {
                content: "x".into()
            }]
        );
    }

    #[test]
    fn record_without_data_line_is_dropped() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push_chunk(
            b"event: ping\n\ndata: {\"type\":\"text_chunk\",\"content\":\"after\"}\n\n",
        );
        assert_eq!(
            events,
            vec![StreamEvent::TextChunk {
                content: "after".into()
            }]
        );
    }

    #[test]
    fn finish_discards_trailing_fragment() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push_chunk(b"data: {\"type\":\"complete\"").is_empty());
        decoder.finish();
    }
}
