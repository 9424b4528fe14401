//! Copy requests from the page, decoded and written to the host clipboard.

use std::sync::{Arc, Mutex};

use crate::error::{BridgeError, BridgeResult};
use crate::transport;

/// Host clipboard sink.
pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> BridgeResult<()>;
}

/// The system clipboard via `arboard`. The handle is opened per write since it is not `Send`
/// on every platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> BridgeResult<()> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| BridgeError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| BridgeError::Clipboard(e.to_string()))
    }
}

/// In-memory clipboard; clones share the same history.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    history: Arc<Mutex<Vec<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<String> {
        self.history().pop()
    }
}

impl Clipboard for MemoryClipboard {
    fn set_text(&mut self, text: &str) -> BridgeResult<()> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text.to_string());
        Ok(())
    }
}

pub struct ClipboardBridge {
    clipboard: Box<dyn Clipboard + Send>,
}

impl ClipboardBridge {
    pub fn new(clipboard: Box<dyn Clipboard + Send>) -> Self {
        Self { clipboard }
    }

    /// Decodes a base64 payload, trims surrounding whitespace and writes it out.
    /// Undecodable payloads and clipboard failures are logged and dropped.
    pub fn copy(&mut self, payload: &str) {
        let text = match transport::decode_base64(payload.trim()) {
            Ok(text) => text,
            Err(e) => {
                log::debug!("dropping copy request: {}", e);
                return;
            }
        };
        if let Err(e) = self.clipboard.set_text(text.trim()) {
            log::warn!("copy to clipboard failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenClipboard;

    impl Clipboard for BrokenClipboard {
        fn set_text(&mut self, _text: &str) -> BridgeResult<()> {
            Err(BridgeError::Clipboard("no display".to_string()))
        }
    }

    #[test]
    fn test_copy_decodes_and_trims() {
        let clipboard = MemoryClipboard::new();
        let mut bridge = ClipboardBridge::new(Box::new(clipboard.clone()));

        bridge.copy(&transport::encode_base64("\n  fn main() {}\n\n"));
        assert_eq!(clipboard.history(), vec!["fn main() {}".to_string()]);
    }

    #[test]
    fn test_copy_ignores_undecodable_payload() {
        let clipboard = MemoryClipboard::new();
        let mut bridge = ClipboardBridge::new(Box::new(clipboard.clone()));

        bridge.copy("%%% not base64 %%%");
        assert!(clipboard.history().is_empty());
    }

    #[test]
    fn test_clipboard_failure_is_swallowed() {
        let mut bridge = ClipboardBridge::new(Box::new(BrokenClipboard));
        bridge.copy(&transport::encode_base64("text"));
    }
}
