//! # markdown-webview
//!
//! Keeps an embedded web renderer showing a host-supplied Markdown string.
//!
//! ## Features
//! - Self-contained page built once from a template, a bridge script and a stylesheet
//! - Content pushes deferred until the page has loaded; only the latest one is kept
//! - Base64 or escaped template-literal transport for arbitrary text
//! - Height, rendered-HTML and clipboard messages decoded from the page
//! - Link clicks routed to a host handler or the system browser, never navigating the page
//! - A headless renderer (pulldown-cmark) for previews and tests
//!
//! ## Example
//! ```ignore
//! use markdown_webview::{HeadlessRenderer, MarkdownWebViewBuilder};
//!
//! let (renderer, mut events) = HeadlessRenderer::new();
//! let mut view = MarkdownWebViewBuilder::new()
//!     .on_height_change(|height| println!("height: {}", height))
//!     .build(renderer);
//!
//! view.set_content("# Hi");
//! view.pump(&mut events);
//! ```

pub mod bootstrap;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod headless;
pub mod message;
pub mod navigation;
pub mod renderer;
pub mod size;
pub mod sync;
pub mod transport;
pub mod view;

// --- Core types ---
pub use bootstrap::{Document, PageAssets, PageBootstrapper, StylesheetVariant};
pub use config::{HeightTracking, ViewConfig};
pub use error::{BridgeError, BridgeResult, DecodeError};
pub use renderer::{event_channel, Renderer, RendererEvent, RendererEvents, ScriptId, SurfaceSettings};
pub use sync::{ContentSynchronizer, LoadState, ReplyTagging};
pub use transport::TransportEncoding;
pub use view::{MarkdownWebView, MarkdownWebViewBuilder};

// --- Messages and collaborators ---
pub use clipboard::{Clipboard, MemoryClipboard, SystemClipboard};
pub use headless::HeadlessRenderer;
pub use message::{Envelope, InboundMessage};
pub use navigation::{
    ExternalOpener, NavigationAttempt, NavigationDecision, NavigationKind, SystemOpener,
};
