//! Content push protocol: defers pushes until the page has loaded, keeps only the
//! newest pending content, and encodes it into a script command the page can run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::renderer::Renderer;
use crate::transport::TransportEncoding;

/// Renderer lifecycle as seen by the host. Moves Loading -> Ready once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
}

/// Whether pushes carry a sequence number that the page echoes back in its replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyTagging {
    /// Replies are accepted at face value; the last message wins.
    #[default]
    Untagged,
    /// Replies tagged with a sequence older than the latest push are dropped.
    Sequenced,
}

/// One content update on its way to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub content: Arc<str>,
    pub sequence: u64,
}

#[derive(Debug)]
enum SyncState {
    /// Bootstrap failed; the renderer will never load and every push is a no-op.
    Detached,
    /// At most one request waits here; a newer push replaces it.
    Loading { pending: Option<RenderRequest> },
    /// `latest` is kept so a page reload can be resynced.
    Ready { latest: Option<RenderRequest> },
}

#[derive(Debug)]
pub struct ContentSynchronizer {
    state: SyncState,
    encoding: TransportEncoding,
    tagging: ReplyTagging,
    next_sequence: u64,
}

impl ContentSynchronizer {
    pub fn new(encoding: TransportEncoding, tagging: ReplyTagging) -> Self {
        Self {
            state: SyncState::Loading { pending: None },
            encoding,
            tagging,
            next_sequence: 1,
        }
    }

    /// Marks the renderer as permanently unloaded (failed bootstrap).
    pub fn detach(&mut self) {
        self.state = SyncState::Detached;
    }

    pub fn is_detached(&self) -> bool {
        matches!(self.state, SyncState::Detached)
    }

    pub fn load_state(&self) -> LoadState {
        match self.state {
            SyncState::Ready { .. } => LoadState::Ready,
            SyncState::Loading { .. } | SyncState::Detached => LoadState::Loading,
        }
    }

    /// The request waiting for the load to finish, if any.
    pub fn pending(&self) -> Option<&RenderRequest> {
        match &self.state {
            SyncState::Loading { pending } => pending.as_ref(),
            _ => None,
        }
    }

    /// Sequence of the most recent push request created, or 0 before the first one.
    pub fn latest_sequence(&self) -> u64 {
        self.next_sequence - 1
    }

    /// Sends `content` to the renderer, or parks it until the load completes.
    ///
    /// Returns the sequence of the request when it was handed to the renderer.
    /// Identical consecutive pushes are all delivered.
    pub fn push<R: Renderer + ?Sized>(&mut self, content: &str, renderer: &mut R) -> Option<u64> {
        if self.is_detached() {
            log::debug!("renderer never loaded; dropping push");
            return None;
        }

        let request = RenderRequest {
            content: Arc::from(content),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        if let SyncState::Loading { pending } = &mut self.state {
            if let Some(superseded) = pending.replace(request) {
                log::trace!("push #{} superseded while loading", superseded.sequence);
            }
            return None;
        }

        let sequence = request.sequence;
        renderer.evaluate_script(&self.command_for(&request), None);
        if let SyncState::Ready { latest } = &mut self.state {
            *latest = Some(request);
        }
        Some(sequence)
    }

    /// Handles the renderer's load-complete signal.
    ///
    /// The first signal flips the state to Ready and flushes the pending request once.
    /// A later signal means the page was reloaded and lost its content, so the latest
    /// request is sent again.
    pub fn on_load_complete<R: Renderer + ?Sized>(&mut self, renderer: &mut R) -> Option<u64> {
        let flush = match &mut self.state {
            SyncState::Detached => return None,
            SyncState::Loading { pending } => {
                let pending = pending.take();
                log::debug!("renderer ready");
                self.state = SyncState::Ready {
                    latest: pending.clone(),
                };
                pending
            }
            SyncState::Ready { latest } => {
                log::debug!("renderer reloaded; resyncing latest content");
                latest.clone()
            }
        };

        let request = flush?;
        renderer.evaluate_script(&self.command_for(&request), None);
        Some(request.sequence)
    }

    /// Script that stores the content in the page and re-runs the conversion.
    pub fn command_for(&self, request: &RenderRequest) -> String {
        let function = match self.encoding {
            TransportEncoding::Base64 => "window.updateWithMarkdownContentBase64Encoded",
            TransportEncoding::Escaped => "window.updateWithMarkdownContent",
        };
        let payload = self.encoding.encode(&request.content);
        match self.tagging {
            ReplyTagging::Untagged => format!("{}(`{}`)", function, payload),
            ReplyTagging::Sequenced => {
                format!("{}(`{}`, {})", function, payload, request.sequence)
            }
        }
    }
}
