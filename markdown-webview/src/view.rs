//! Host-facing view: owns the renderer adapter and ties bootstrap, content pushes,
//! inbound messages and navigation policy together.

use std::path::Path;

use url::Url;

use crate::bootstrap::{Document, PageAssets, PageBootstrapper};
use crate::clipboard::{Clipboard, ClipboardBridge, SystemClipboard};
use crate::config::{HeightTracking, ViewConfig};
use crate::error::BridgeResult;
use crate::message::{HeightHandler, MessageBridge, RenderedHandler};
use crate::navigation::{
    ExternalOpener, LinkHandler, NavigationAttempt, NavigationDecision, NavigationPolicy,
    SystemOpener,
};
use crate::renderer::{Renderer, RendererEvent, RendererEvents, ScriptId};
use crate::sync::{ContentSynchronizer, LoadState};

/// Script used to read the content height when polling after a push.
pub const HEIGHT_QUERY_SCRIPT: &str = "document.body.scrollHeight";

/// Configures callbacks and collaborators, then bootstraps the renderer in [`build`](Self::build).
pub struct MarkdownWebViewBuilder {
    config: ViewConfig,
    assets: Option<BridgeResult<PageAssets>>,
    custom_stylesheet: Option<String>,
    link_handler: Option<LinkHandler>,
    rendered_handler: Option<RenderedHandler>,
    height_handler: Option<HeightHandler>,
    clipboard: Box<dyn Clipboard + Send>,
    opener: Box<dyn ExternalOpener + Send>,
}

impl Default for MarkdownWebViewBuilder {
    fn default() -> Self {
        Self {
            config: ViewConfig::default(),
            assets: None,
            custom_stylesheet: None,
            link_handler: None,
            rendered_handler: None,
            height_handler: None,
            clipboard: Box::new(SystemClipboard),
            opener: Box::new(SystemOpener),
        }
    }
}

impl MarkdownWebViewBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ViewConfig) -> Self {
        self.config = config;
        self
    }

    /// Page assets to bootstrap from. Defaults to the bundled ones.
    pub fn assets(mut self, assets: PageAssets) -> Self {
        self.assets = Some(Ok(assets));
        self
    }

    /// Reads page assets from a directory at build time. An unreadable asset leaves the
    /// view blank rather than failing the build.
    pub fn assets_from_dir(mut self, dir: &Path) -> Self {
        self.assets = Some(PageAssets::from_dir(dir, self.config.stylesheet));
        self
    }

    /// Replaces the default stylesheet.
    pub fn custom_stylesheet(mut self, stylesheet: impl Into<String>) -> Self {
        self.custom_stylesheet = Some(stylesheet.into());
        self
    }

    /// Called with the target of every link the user activates inside the page.
    /// Without it links open in the platform's default handler.
    pub fn on_link_activation(mut self, handler: impl FnMut(&Url) + Send + 'static) -> Self {
        self.link_handler = Some(Box::new(handler));
        self
    }

    /// Called with the page's HTML after each conversion.
    pub fn on_rendered(mut self, handler: impl FnMut(&str) + Send + 'static) -> Self {
        self.rendered_handler = Some(Box::new(handler));
        self
    }

    /// Called whenever the content height changes; the host should re-layout.
    pub fn on_height_change(mut self, handler: impl FnMut(f64) + Send + 'static) -> Self {
        self.height_handler = Some(Box::new(handler));
        self
    }

    pub fn clipboard(mut self, clipboard: impl Clipboard + Send + 'static) -> Self {
        self.clipboard = Box::new(clipboard);
        self
    }

    pub fn opener(mut self, opener: impl ExternalOpener + Send + 'static) -> Self {
        self.opener = Box::new(opener);
        self
    }

    /// Bootstraps `renderer` and returns the view. Issues exactly one page load.
    pub fn build<R: Renderer>(self, mut renderer: R) -> MarkdownWebView<R> {
        let config = self.config;
        let custom_stylesheet = self.custom_stylesheet;
        let assets = self
            .assets
            .unwrap_or_else(|| Ok(PageAssets::bundled(config.stylesheet)))
            .map(|assets| match custom_stylesheet {
                Some(css) => assets.with_stylesheet(css),
                None => assets,
            });

        let mut sync = ContentSynchronizer::new(config.transport, config.reply_tagging);
        let document = match PageBootstrapper::new(assets, config.surface.clone())
            .bootstrap(&mut renderer)
        {
            Ok(document) => Some(document),
            Err(e) => {
                log::warn!("page bootstrap failed, view stays blank: {}", e);
                sync.detach();
                None
            }
        };

        let mut bridge = MessageBridge::new(
            ClipboardBridge::new(self.clipboard),
            config.reply_tagging,
            config.max_message_bytes,
        );
        bridge.set_rendered_handler(self.rendered_handler);
        bridge.set_height_handler(self.height_handler);

        let mut navigation = NavigationPolicy::new(self.opener);
        navigation.set_link_handler(self.link_handler);

        MarkdownWebView {
            renderer,
            sync,
            bridge,
            navigation,
            height_tracking: config.height_tracking,
            document,
            next_script_id: 1,
            height_query: None,
        }
    }
}

/// A Markdown string mirrored into an embedded renderer.
///
/// All methods run on the host thread and return without waiting on the renderer.
pub struct MarkdownWebView<R: Renderer> {
    renderer: R,
    sync: ContentSynchronizer,
    bridge: MessageBridge,
    navigation: NavigationPolicy,
    height_tracking: HeightTracking,
    document: Option<Document>,
    next_script_id: u64,
    height_query: Option<ScriptId>,
}

impl<R: Renderer> MarkdownWebView<R> {
    /// Sets the Markdown to display. Before the page has loaded only the latest value
    /// is kept; after that every call triggers a conversion in the page.
    pub fn set_content(&mut self, markdown: &str) {
        if let Some(sequence) = self.sync.push(markdown, &mut self.renderer) {
            self.after_push(sequence);
        }
    }

    /// Handles one renderer event.
    pub fn handle_event(&mut self, event: RendererEvent) {
        match event {
            RendererEvent::LoadFinished => {
                if let Some(sequence) = self.sync.on_load_complete(&mut self.renderer) {
                    self.after_push(sequence);
                }
            }
            RendererEvent::Message { channel, body } => {
                if self.sync.is_detached() {
                    return;
                }
                self.bridge.dispatch(&channel, &body);
            }
            RendererEvent::NavigationRequested { attempt, reply } => {
                let decision = self.decide_navigation(&attempt);
                if let Some(reply) = reply {
                    let _ = reply.send(decision);
                }
            }
            RendererEvent::ScriptCompleted { id, result } => {
                if self.height_query != Some(id) {
                    return;
                }
                self.height_query = None;
                match result.map(|value| value.as_f64()) {
                    Ok(Some(height)) => self.bridge.observe_height(height),
                    Ok(None) => log::debug!("height query returned a non-number"),
                    Err(e) => log::debug!("height query failed: {}", e),
                }
            }
        }
    }

    /// Applies the navigation policy to one attempt.
    pub fn decide_navigation(&mut self, attempt: &NavigationAttempt) -> NavigationDecision {
        self.navigation.decide(attempt)
    }

    /// Handles every event already queued, without waiting. Returns how many were handled.
    pub fn pump(&mut self, events: &mut RendererEvents) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Waits for the next event and handles it. Returns false once the channel is closed.
    pub async fn handle_next(&mut self, events: &mut RendererEvents) -> bool {
        match events.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Handles events until every sender has been dropped.
    pub async fn run(&mut self, events: &mut RendererEvents) {
        while self.handle_next(events).await {}
        log::debug!("renderer event channel closed");
    }

    pub fn load_state(&self) -> LoadState {
        self.sync.load_state()
    }

    /// True when bootstrap failed and the view will never show content.
    pub fn is_detached(&self) -> bool {
        self.sync.is_detached()
    }

    pub fn content_height(&self) -> f64 {
        self.bridge.content_height()
    }

    /// The page that was loaded, if bootstrap succeeded.
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    fn after_push(&mut self, sequence: u64) {
        self.bridge.note_push(sequence);
        if self.height_tracking == HeightTracking::PollAfterPush {
            let id = ScriptId(self.next_script_id);
            self.next_script_id += 1;
            self.height_query = Some(id);
            self.renderer.evaluate_script(HEIGHT_QUERY_SCRIPT, Some(id));
        }
    }
}
