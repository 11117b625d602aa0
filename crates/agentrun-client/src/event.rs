use tracing::{debug, warn};

/// Decoded event from the execution stream.
///
/// Events arrive as `data: <JSON>` payload lines with a `type` tag. Types
/// not listed here are ignored by the decoder.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Raw HTML appended to the output target.
    HtmlChunk { content: String },
    /// Plain text routed to the single streaming-text region.
    TextChunk { content: String },
    /// Rendered markdown replacing the keyed region's contents.
    MarkdownUpdate {
        container_id: String,
        content: String,
    },
    /// Final rendered block superseding the keyed region and any
    /// streaming text.
    FinalContent {
        container_id: String,
        content: String,
    },
    /// Terminal success, optionally carrying the full HTML result for
    /// persistence.
    Complete {
        #[serde(default)]
        html_result: Option<String>,
    },
    /// Terminal server-reported failure. The message field is named
    /// `error` on the wire.
    Error {
        #[serde(rename = "error")]
        message: String,
    },
}

impl StreamEvent {
    /// Returns true for events that end the execution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }

    /// Decodes one `data:` payload into an event.
    ///
    /// Returns `None` for payloads that are not valid JSON, carry no
    /// `type` field, or carry a type this client does not know; none of
    /// these abort the stream.
    pub(crate) fn decode_payload(raw: &str) -> Option<StreamEvent> {
        let data = strip_spliced_record(raw);
        let value: serde_json::Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "dropping stream record with undecodable payload");
                return None;
            }
        };
        match serde_json::from_value::<StreamEvent>(value.clone()) {
            Ok(event) => Some(event),
            Err(err) => {
                match value.get("type").and_then(|v| v.as_str()) {
                    Some(kind) => debug!(kind, %err, "ignoring unrecognized stream event"),
                    None => warn!("dropping stream record without an event type"),
                }
                None
            }
        }
    }
}

/// Trims a payload line that accidentally carries a second concatenated
/// record (`}\n\ndata:` inside one physical line).
///
/// Known workaround for a malformed-producer framing bug; only the first
/// record survives.
fn strip_spliced_record(data: &str) -> &str {
    match data.find("}\n\ndata:") {
        Some(idx) if idx > 0 => &data[..=idx],
        _ => data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_known_event_type() {
        let cases = [
            (
                r#"{"type":"html_chunk","content":"<p>a</p>"}"#,
                StreamEvent::HtmlChunk {
                    content: "<p>a</p>".into(),
                },
            ),
            (
                r#"{"type":"text_chunk","content":"plain"}"#,
                StreamEvent::TextChunk {
                    content: "plain".into(),
                },
            ),
            (
                r#"{"type":"markdown_update","container_id":"md-1","content":"<em>x</em>"}"#,
                StreamEvent::MarkdownUpdate {
                    container_id: "md-1".into(),
                    content: "<em>x</em>".into(),
                },
            ),
            (
                r#"{"type":"final_content","container_id":"md-1","content":"<b>done</b>"}"#,
                StreamEvent::FinalContent {
                    container_id: "md-1".into(),
                    content: "<b>done</b>".into(),
                },
            ),
            (
                r#"{"type":"complete","html_result":"<p>ok</p>"}"#,
                StreamEvent::Complete {
                    html_result: Some("<p>ok</p>".into()),
                },
            ),
            (
                r#"{"type":"error","error":"boom"}"#,
                StreamEvent::Error {
                    message: "boom".into(),
                },
            ),
        ];
        for (raw, expected) in cases {
            assert_eq!(StreamEvent::decode_payload(raw), Some(expected));
        }
    }

    #[test]
    fn complete_without_result_decodes_to_none_result() {
        let event = StreamEvent::decode_payload(r#"{"type":"complete"}"#);
        assert_eq!(event, Some(StreamEvent::Complete { html_result: None }));
    }

    #[test]
    fn unknown_type_is_ignored() {
        assert_eq!(
            StreamEvent::decode_payload(r#"{"type":"heartbeat","content":"x"}"#),
            None
        );
    }

    #[test]
    fn invalid_json_is_dropped() {
        assert_eq!(StreamEvent::decode_payload(r#"{"type":"#), None);
    }

    #[test]
    fn spliced_record_keeps_only_the_first_json_object() {
        let raw = "{\"type\":\"text_chunk\",\"content\":\"a\"}\n\ndata: {\"type\":\"text_chunk\",\"content\":\"b\"}";
        assert_eq!(
            StreamEvent::decode_payload(raw),
            Some(StreamEvent::TextChunk { content: "a".into() })
        );
    }

    #[test]
    fn splice_guard_ignores_a_match_at_offset_zero() {
        // The guard only fires past the first byte, matching the producer
        // bug it works around.
        assert_eq!(strip_spliced_record("}\n\ndata: x"), "}\n\ndata: x");
    }
}
