//! Interface to the embedded renderer (the webview) and the events it reports back.
//! The renderer runs script in its own context; everything here is fire-and-forget.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::bootstrap::Document;
use crate::error::BridgeResult;
use crate::navigation::{NavigationAttempt, NavigationDecision};

/// Identifies a script evaluation whose result the host wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptId(pub u64);

/// Presentation flags applied to the surface once, before the document loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceSettings {
    pub transparent_background: bool,
    /// The surface grows to its content height; the host scrolls, not the webview.
    pub scroll_enabled: bool,
    /// Expose the page to the platform's web inspector.
    pub inspectable: bool,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            transparent_background: true,
            scroll_enabled: false,
            inspectable: cfg!(debug_assertions),
        }
    }
}

/// Primitives a renderer adapter must provide.
pub trait Renderer {
    fn configure(&mut self, _settings: &SurfaceSettings) {}

    /// Starts loading `document`. Completion is reported later as [`RendererEvent::LoadFinished`].
    fn load_document(&mut self, document: &Document) -> BridgeResult<()>;

    /// Queues `source` for evaluation in the page. When `reply_to` is set the adapter
    /// reports the outcome as [`RendererEvent::ScriptCompleted`] with that id.
    fn evaluate_script(&mut self, source: &str, reply_to: Option<ScriptId>);
}

/// Notifications from the renderer to the host, in the order the renderer produced them.
#[derive(Debug)]
pub enum RendererEvent {
    LoadFinished,
    Message {
        channel: String,
        body: serde_json::Value,
    },
    NavigationRequested {
        attempt: NavigationAttempt,
        /// Present when the adapter is waiting on the decision before navigating.
        reply: Option<oneshot::Sender<NavigationDecision>>,
    },
    ScriptCompleted {
        id: ScriptId,
        result: Result<serde_json::Value, String>,
    },
}

pub type RendererEventSender = mpsc::UnboundedSender<RendererEvent>;
pub type RendererEvents = mpsc::UnboundedReceiver<RendererEvent>;

/// Creates the channel an adapter posts its events into.
pub fn event_channel() -> (RendererEventSender, RendererEvents) {
    mpsc::unbounded_channel()
}
