//! Inbound messages from the page: untyped bodies decoded into [`InboundMessage`]
//! and routed to the size observer, the clipboard and the host callbacks.
//!
//! Nothing that arrives here can fail the host. Bodies that do not decode, arrive on an
//! unknown channel, are too large, or (in sequenced mode) answer a superseded push are
//! logged at debug level and dropped.

use serde_json::Value;

use crate::clipboard::ClipboardBridge;
use crate::error::DecodeError;
use crate::size::SizeObserver;
use crate::sync::ReplyTagging;
use crate::transport;

pub const SIZE_CHANGED_CHANNEL: &str = "sizeChangeHandler";
pub const RENDERED_CONTENT_CHANNEL: &str = "renderedContentHandler";
pub const CLIPBOARD_COPY_CHANNEL: &str = "copyToPasteboard";

/// Every channel the page script posts to.
pub const CHANNELS: [&str; 3] = [
    SIZE_CHANGED_CHANNEL,
    RENDERED_CONTENT_CHANNEL,
    CLIPBOARD_COPY_CHANNEL,
];

/// Default cap on a single inbound body.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 32 * 1024 * 1024;

/// Base64 text as posted by the page, not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload(pub String);

impl EncodedPayload {
    pub fn decode(&self) -> Result<String, DecodeError> {
        transport::decode_base64(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    SizeChanged { height: f64 },
    RenderedContent(EncodedPayload),
    ClipboardCopy(EncodedPayload),
}

/// A decoded message plus the push sequence it answers, when the page tagged it.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub sequence: Option<u64>,
    pub message: InboundMessage,
}

/// Decodes one raw body posted on `channel`.
///
/// Bodies are either the bare value or `{"sequence": n, "value": ...}`.
pub fn decode(channel: &str, body: &Value) -> Result<Envelope, DecodeError> {
    let (sequence, value) = split_tag(body);

    let message = match channel {
        SIZE_CHANGED_CHANNEL => {
            let height = value.as_f64().ok_or_else(|| DecodeError::WrongType {
                channel: channel.to_string(),
                expected: "a number",
            })?;
            if !height.is_finite() || height < 0.0 {
                return Err(DecodeError::InvalidHeight { value: height });
            }
            InboundMessage::SizeChanged { height }
        }
        RENDERED_CONTENT_CHANNEL => InboundMessage::RenderedContent(string_payload(channel, value)?),
        CLIPBOARD_COPY_CHANNEL => InboundMessage::ClipboardCopy(string_payload(channel, value)?),
        other => return Err(DecodeError::UnknownChannel(other.to_string())),
    };

    Ok(Envelope { sequence, message })
}

fn split_tag(body: &Value) -> (Option<u64>, &Value) {
    if let Value::Object(map) = body {
        if let (Some(sequence), Some(value)) =
            (map.get("sequence").and_then(Value::as_u64), map.get("value"))
        {
            return (Some(sequence), value);
        }
    }
    (None, body)
}

fn string_payload(channel: &str, value: &Value) -> Result<EncodedPayload, DecodeError> {
    value
        .as_str()
        .map(|s| EncodedPayload(s.to_string()))
        .ok_or_else(|| DecodeError::WrongType {
            channel: channel.to_string(),
            expected: "a string",
        })
}

/// Rough byte size of a body, without serializing it.
fn body_size(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        Value::Array(items) => items.iter().map(body_size).sum(),
        Value::Object(map) => map.iter().map(|(k, v)| k.len() + body_size(v)).sum(),
        _ => 8,
    }
}

pub type RenderedHandler = Box<dyn FnMut(&str) + Send>;
pub type HeightHandler = Box<dyn FnMut(f64) + Send>;

pub struct MessageBridge {
    size: SizeObserver,
    clipboard: ClipboardBridge,
    on_rendered: Option<RenderedHandler>,
    on_height_change: Option<HeightHandler>,
    tagging: ReplyTagging,
    latest_sequence: u64,
    max_body_bytes: usize,
}

impl MessageBridge {
    pub fn new(clipboard: ClipboardBridge, tagging: ReplyTagging, max_body_bytes: usize) -> Self {
        Self {
            size: SizeObserver::new(),
            clipboard,
            on_rendered: None,
            on_height_change: None,
            tagging,
            latest_sequence: 0,
            max_body_bytes,
        }
    }

    pub fn set_rendered_handler(&mut self, handler: Option<RenderedHandler>) {
        self.on_rendered = handler;
    }

    pub fn set_height_handler(&mut self, handler: Option<HeightHandler>) {
        self.on_height_change = handler;
    }

    /// Records the sequence of a push that reached the renderer.
    pub fn note_push(&mut self, sequence: u64) {
        self.latest_sequence = self.latest_sequence.max(sequence);
    }

    pub fn content_height(&self) -> f64 {
        self.size.height()
    }

    /// Decodes and routes one message. Never fails.
    pub fn dispatch(&mut self, channel: &str, body: &Value) {
        let size = body_size(body);
        if size > self.max_body_bytes {
            log::debug!(
                "dropping message on '{}': {}",
                channel,
                DecodeError::Oversized {
                    size,
                    limit: self.max_body_bytes
                }
            );
            return;
        }

        let envelope = match decode(channel, body) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::debug!("dropping message on '{}': {}", channel, e);
                return;
            }
        };

        // copies are user actions, not replies to a push
        let answers_push = !matches!(envelope.message, InboundMessage::ClipboardCopy(_));
        if answers_push && self.is_stale(envelope.sequence) {
            log::trace!(
                "dropping reply to superseded push #{:?} on '{}'",
                envelope.sequence,
                channel
            );
            return;
        }

        match envelope.message {
            InboundMessage::SizeChanged { height } => self.observe_height(height),
            InboundMessage::RenderedContent(payload) => {
                let Some(handler) = self.on_rendered.as_mut() else {
                    return;
                };
                match payload.decode() {
                    Ok(html) => handler(&html),
                    Err(e) => log::debug!("dropping rendered content: {}", e),
                }
            }
            InboundMessage::ClipboardCopy(payload) => self.clipboard.copy(&payload.0),
        }
    }

    /// Feeds a height into the observer and notifies the host when it changed.
    pub fn observe_height(&mut self, height: f64) {
        if self.size.observe(height) {
            log::trace!("content height now {}", height);
            if let Some(handler) = self.on_height_change.as_mut() {
                handler(height);
            }
        }
    }

    fn is_stale(&self, sequence: Option<u64>) -> bool {
        match (self.tagging, sequence) {
            (ReplyTagging::Sequenced, Some(sequence)) => sequence < self.latest_sequence,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct Harness {
        bridge: MessageBridge,
        clipboard: MemoryClipboard,
        rendered: Arc<Mutex<Vec<String>>>,
        heights: Arc<Mutex<Vec<f64>>>,
    }

    fn harness(tagging: ReplyTagging) -> Harness {
        let clipboard = MemoryClipboard::new();
        let mut bridge = MessageBridge::new(
            ClipboardBridge::new(Box::new(clipboard.clone())),
            tagging,
            1024,
        );
        let rendered = Arc::new(Mutex::new(Vec::new()));
        let heights = Arc::new(Mutex::new(Vec::new()));
        let (r, h) = (rendered.clone(), heights.clone());
        bridge.set_rendered_handler(Some(Box::new(move |html: &str| {
            r.lock().unwrap().push(html.to_string())
        })));
        bridge.set_height_handler(Some(Box::new(move |height: f64| h.lock().unwrap().push(height))));
        Harness {
            bridge,
            clipboard,
            rendered,
            heights,
        }
    }

    #[test]
    fn test_decode_each_channel() {
        assert_eq!(
            decode(SIZE_CHANGED_CHANNEL, &json!(120)).unwrap().message,
            InboundMessage::SizeChanged { height: 120.0 }
        );
        assert_eq!(
            decode(RENDERED_CONTENT_CHANNEL, &json!("PGgxPg==")).unwrap().message,
            InboundMessage::RenderedContent(EncodedPayload("PGgxPg==".to_string()))
        );
        let tagged = decode(CLIPBOARD_COPY_CHANNEL, &json!({"sequence": 3, "value": "eA=="})).unwrap();
        assert_eq!(tagged.sequence, Some(3));
        assert_eq!(
            tagged.message,
            InboundMessage::ClipboardCopy(EncodedPayload("eA==".to_string()))
        );
    }

    #[test]
    fn test_decode_rejects_malformed_bodies() {
        assert!(matches!(
            decode(SIZE_CHANGED_CHANNEL, &json!("120")),
            Err(DecodeError::WrongType { .. })
        ));
        assert!(matches!(
            decode(SIZE_CHANGED_CHANNEL, &json!(-5.0)),
            Err(DecodeError::InvalidHeight { .. })
        ));
        assert!(matches!(
            decode(RENDERED_CONTENT_CHANNEL, &json!({"html": "x"})),
            Err(DecodeError::WrongType { .. })
        ));
        assert_eq!(
            decode("somethingElse", &json!(1)),
            Err(DecodeError::UnknownChannel("somethingElse".to_string()))
        );
    }

    #[test]
    fn test_size_changes_notify_only_on_change() {
        let mut h = harness(ReplyTagging::Untagged);
        for height in [120.0, 120.0, 150.0] {
            h.bridge.dispatch(SIZE_CHANGED_CHANNEL, &json!(height));
        }
        assert_eq!(*h.heights.lock().unwrap(), vec![120.0, 150.0]);
        assert_eq!(h.bridge.content_height(), 150.0);
    }

    #[test]
    fn test_rendered_content_is_decoded() {
        let mut h = harness(ReplyTagging::Untagged);
        let html = "<h1>Hi</h1>";
        h.bridge
            .dispatch(RENDERED_CONTENT_CHANNEL, &json!(transport::encode_base64(html)));
        assert_eq!(*h.rendered.lock().unwrap(), vec![html.to_string()]);
    }

    #[test]
    fn test_rendered_content_without_handler_is_fine() {
        let mut h = harness(ReplyTagging::Untagged);
        h.bridge.set_rendered_handler(None);
        h.bridge
            .dispatch(RENDERED_CONTENT_CHANNEL, &json!(transport::encode_base64("<p>x</p>")));
        assert!(h.rendered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_clipboard_copy_routed() {
        let mut h = harness(ReplyTagging::Untagged);
        h.bridge
            .dispatch(CLIPBOARD_COPY_CHANNEL, &json!(transport::encode_base64(" let x = 1; ")));
        assert_eq!(h.clipboard.history(), vec!["let x = 1;".to_string()]);
    }

    #[test]
    fn test_malformed_messages_have_no_effect() {
        let mut h = harness(ReplyTagging::Untagged);
        h.bridge.dispatch(SIZE_CHANGED_CHANNEL, &json!(null));
        h.bridge.dispatch(SIZE_CHANGED_CHANNEL, &json!({"height": 10}));
        h.bridge.dispatch(RENDERED_CONTENT_CHANNEL, &json!("***"));
        h.bridge.dispatch(RENDERED_CONTENT_CHANNEL, &json!(42));
        h.bridge.dispatch(CLIPBOARD_COPY_CHANNEL, &json!(["a"]));
        h.bridge.dispatch("unknown", &json!("x"));
        h.bridge
            .dispatch(RENDERED_CONTENT_CHANNEL, &json!("A".repeat(4096)));

        assert!(h.heights.lock().unwrap().is_empty());
        assert!(h.rendered.lock().unwrap().is_empty());
        assert!(h.clipboard.history().is_empty());
    }

    #[test]
    fn test_untagged_mode_accepts_stale_replies() {
        let mut h = harness(ReplyTagging::Untagged);
        h.bridge.note_push(5);
        h.bridge
            .dispatch(SIZE_CHANGED_CHANNEL, &json!({"sequence": 2, "value": 80}));
        assert_eq!(*h.heights.lock().unwrap(), vec![80.0]);
    }

    #[test]
    fn test_sequenced_mode_drops_stale_replies() {
        let mut h = harness(ReplyTagging::Sequenced);
        h.bridge.note_push(5);
        h.bridge
            .dispatch(SIZE_CHANGED_CHANNEL, &json!({"sequence": 4, "value": 80}));
        h.bridge
            .dispatch(SIZE_CHANGED_CHANNEL, &json!({"sequence": 5, "value": 90}));
        // untagged replies are still taken at face value
        h.bridge.dispatch(SIZE_CHANGED_CHANNEL, &json!(100));
        assert_eq!(*h.heights.lock().unwrap(), vec![90.0, 100.0]);
    }

    #[test]
    fn test_sequenced_mode_keeps_copies_from_displayed_page() {
        let mut h = harness(ReplyTagging::Sequenced);
        h.bridge.note_push(2);
        h.bridge.dispatch(
            CLIPBOARD_COPY_CHANNEL,
            &json!({"sequence": 1, "value": transport::encode_base64("cargo run")}),
        );
        h.bridge.dispatch(
            RENDERED_CONTENT_CHANNEL,
            &json!({"sequence": 1, "value": transport::encode_base64("<p>old</p>")}),
        );
        assert_eq!(h.clipboard.history(), vec!["cargo run".to_string()]);
        assert!(h.rendered.lock().unwrap().is_empty());
    }
}
