//! Navigation policy: link clicks never navigate the page away; they are handed to
//! the host's link handler or opened externally. Everything else is allowed.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BridgeError, BridgeResult};

/// What triggered a navigation, as reported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationKind {
    LinkActivated,
    FormSubmitted,
    BackForward,
    Reload,
    FormResubmitted,
    /// Programmatic loads, including the initial page load.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationAttempt {
    pub kind: NavigationKind,
    pub target: Option<String>,
}

impl NavigationAttempt {
    pub fn link(target: impl Into<String>) -> Self {
        Self {
            kind: NavigationKind::LinkActivated,
            target: Some(target.into()),
        }
    }

    pub fn new(kind: NavigationKind, target: Option<String>) -> Self {
        Self { kind, target }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Cancel,
}

pub type LinkHandler = Box<dyn FnMut(&Url) + Send>;

/// Schemes never handed to the platform opener.
const BLOCKED_SCHEMES: &[&str] = &["javascript", "file", "data", "blob"];

/// Opens a URL outside the embedded view.
pub trait ExternalOpener {
    fn open(&mut self, url: &Url) -> BridgeResult<()>;
}

impl<F> ExternalOpener for F
where
    F: FnMut(&Url) -> BridgeResult<()>,
{
    fn open(&mut self, url: &Url) -> BridgeResult<()> {
        self(url)
    }
}

/// The platform's default browser / URL handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl ExternalOpener for SystemOpener {
    fn open(&mut self, url: &Url) -> BridgeResult<()> {
        webbrowser::open(url.as_str()).map_err(|e| BridgeError::OpenFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

pub struct NavigationPolicy {
    link_handler: Option<LinkHandler>,
    opener: Box<dyn ExternalOpener + Send>,
}

impl NavigationPolicy {
    pub fn new(opener: Box<dyn ExternalOpener + Send>) -> Self {
        Self {
            link_handler: None,
            opener,
        }
    }

    pub fn set_link_handler(&mut self, handler: Option<LinkHandler>) {
        self.link_handler = handler;
    }

    pub fn has_link_handler(&self) -> bool {
        self.link_handler.is_some()
    }

    /// Decides one navigation attempt. Link activations are always cancelled; as a side
    /// effect the target goes to the link handler, or to the external opener when no
    /// handler is registered. A link without a parseable target is cancelled silently.
    pub fn decide(&mut self, attempt: &NavigationAttempt) -> NavigationDecision {
        if attempt.kind != NavigationKind::LinkActivated {
            return NavigationDecision::Allow;
        }

        let url = match attempt.target.as_deref().map(Url::parse) {
            Some(Ok(url)) => url,
            Some(Err(e)) => {
                log::debug!("link target {:?} is not a URL: {}", attempt.target, e);
                return NavigationDecision::Cancel;
            }
            None => return NavigationDecision::Cancel,
        };

        match self.link_handler.as_mut() {
            Some(handler) => handler(&url),
            None => {
                if let Err(e) = self.open_externally(&url) {
                    log::warn!("{}", e);
                }
            }
        }
        NavigationDecision::Cancel
    }

    fn open_externally(&mut self, url: &Url) -> BridgeResult<()> {
        if BLOCKED_SCHEMES.contains(&url.scheme()) {
            return Err(BridgeError::OpenRefused {
                url: url.to_string(),
                reason: format!("'{}' links are not opened", url.scheme()),
            });
        }
        self.opener.open(url)
    }
}
