//! A renderer that needs no webview: it understands the push commands the host
//! sends, converts Markdown with pulldown-cmark, and posts the same messages the
//! bundled page script would. Used by the preview binary and the tests.

use pulldown_cmark::{html, Options, Parser};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::bootstrap::Document;
use crate::error::{BridgeResult, DecodeError};
use crate::message::{CLIPBOARD_COPY_CHANNEL, RENDERED_CONTENT_CHANNEL, SIZE_CHANGED_CHANNEL};
use crate::navigation::{NavigationAttempt, NavigationDecision};
use crate::renderer::{
    event_channel, Renderer, RendererEvent, RendererEventSender, RendererEvents, ScriptId,
    SurfaceSettings,
};
use crate::transport::{self, TransportEncoding};
use crate::view::HEIGHT_QUERY_SCRIPT;

/// Height given to every non-empty line of rendered HTML.
pub const LINE_HEIGHT: f64 = 24.0;

const BASE64_PUSH: &str = "window.updateWithMarkdownContentBase64Encoded(";
const ESCAPED_PUSH: &str = "window.updateWithMarkdownContent(";

/// Markdown content carried by one push command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPush {
    pub markdown: String,
    pub sequence: Option<u64>,
}

/// Parses a push command in either transport encoding.
///
/// Returns `Ok(None)` for scripts that are not push commands.
pub fn parse_push(source: &str) -> Result<Option<ParsedPush>, DecodeError> {
    let (encoding, rest) = if let Some(rest) = source.strip_prefix(BASE64_PUSH) {
        (TransportEncoding::Base64, rest)
    } else if let Some(rest) = source.strip_prefix(ESCAPED_PUSH) {
        (TransportEncoding::Escaped, rest)
    } else {
        return Ok(None);
    };

    let rest = rest
        .strip_prefix('`')
        .ok_or_else(|| malformed("expected a template literal argument"))?;
    let end = closing_backtick(rest).ok_or_else(|| malformed("unterminated template literal"))?;
    let (literal, tail) = (&rest[..end], &rest[end + 1..]);

    let args = tail
        .strip_suffix(')')
        .ok_or_else(|| malformed("missing closing parenthesis"))?
        .trim();
    let sequence = if args.is_empty() {
        None
    } else {
        let n = args
            .strip_prefix(',')
            .ok_or_else(|| malformed("unexpected trailing arguments"))?
            .trim();
        Some(
            n.parse::<u64>()
                .map_err(|_| malformed(&format!("bad sequence '{}'", n)))?,
        )
    };

    Ok(Some(ParsedPush {
        markdown: encoding.decode(literal)?,
        sequence,
    }))
}

fn closing_backtick(literal: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in literal.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '`' => return Some(i),
            _ => {}
        }
    }
    None
}

fn malformed(reason: &str) -> DecodeError {
    DecodeError::MalformedLiteral(reason.to_string())
}

/// CommonMark plus tables and strikethrough, rendered to HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, opts);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Layout stand-in: one [`LINE_HEIGHT`] per non-empty line of HTML.
pub fn estimate_height(html: &str) -> f64 {
    html.lines().filter(|line| !line.trim().is_empty()).count() as f64 * LINE_HEIGHT
}

pub struct HeadlessRenderer {
    events: RendererEventSender,
    settings: Option<SurfaceSettings>,
    document: Option<Document>,
    defer_load: bool,
    rendered_html: String,
    height: f64,
    last_sequence: Option<u64>,
    pushes: Vec<String>,
}

impl HeadlessRenderer {
    /// A renderer that reports load completion as soon as a document is loaded.
    pub fn new() -> (Self, RendererEvents) {
        Self::with_load_mode(false)
    }

    /// A renderer whose load only completes when [`complete_load`](Self::complete_load) is called.
    pub fn deferred_load() -> (Self, RendererEvents) {
        Self::with_load_mode(true)
    }

    fn with_load_mode(defer_load: bool) -> (Self, RendererEvents) {
        let (events, receiver) = event_channel();
        let renderer = Self {
            events,
            settings: None,
            document: None,
            defer_load,
            rendered_html: String::new(),
            height: 0.0,
            last_sequence: None,
            pushes: Vec::new(),
        };
        (renderer, receiver)
    }

    /// Reports load completion. Calling it again behaves like a page reload.
    pub fn complete_load(&mut self) {
        self.send(RendererEvent::LoadFinished);
    }

    /// Simulates a reload: the page loses its content and reports load completion again.
    pub fn reload(&mut self) {
        self.rendered_html.clear();
        self.height = 0.0;
        self.last_sequence = None;
        self.complete_load();
    }

    /// Simulates the user activating a link. The receiver resolves once the host decides.
    pub fn click_link(&mut self, href: &str) -> oneshot::Receiver<NavigationDecision> {
        self.navigate(NavigationAttempt::link(href))
    }

    pub fn navigate(&mut self, attempt: NavigationAttempt) -> oneshot::Receiver<NavigationDecision> {
        let (reply, decision) = oneshot::channel();
        self.send(RendererEvent::NavigationRequested {
            attempt,
            reply: Some(reply),
        });
        decision
    }

    /// Simulates the copy button on a code block.
    pub fn request_copy(&mut self, text: &str) {
        self.post(CLIPBOARD_COPY_CHANNEL, json!(transport::encode_base64(text)));
    }

    /// Posts an arbitrary body, e.g. something malformed.
    pub fn post_raw(&mut self, channel: &str, body: Value) {
        self.send(RendererEvent::Message {
            channel: channel.to_string(),
            body,
        });
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn settings(&self) -> Option<&SurfaceSettings> {
        self.settings.as_ref()
    }

    /// HTML of the most recent conversion.
    pub fn rendered_html(&self) -> &str {
        &self.rendered_html
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Every Markdown string received, in order.
    pub fn pushes(&self) -> &[String] {
        &self.pushes
    }

    fn render(&mut self, push: ParsedPush) {
        self.rendered_html = markdown_to_html(&push.markdown);
        self.height = estimate_height(&self.rendered_html);
        self.last_sequence = push.sequence;
        self.pushes.push(push.markdown);

        let encoded = transport::encode_base64(&self.rendered_html);
        self.post(RENDERED_CONTENT_CHANNEL, json!(encoded));
        self.post(SIZE_CHANGED_CHANNEL, json!(self.height));
    }

    fn post(&mut self, channel: &str, value: Value) {
        let body = match self.last_sequence {
            Some(sequence) => json!({ "sequence": sequence, "value": value }),
            None => value,
        };
        self.post_raw(channel, body);
    }

    fn reply(&mut self, reply_to: Option<ScriptId>, result: Result<Value, String>) {
        if let Some(id) = reply_to {
            self.send(RendererEvent::ScriptCompleted { id, result });
        }
    }

    fn send(&self, event: RendererEvent) {
        if self.events.send(event).is_err() {
            log::trace!("host stopped listening; event dropped");
        }
    }
}

impl Renderer for HeadlessRenderer {
    fn configure(&mut self, settings: &SurfaceSettings) {
        self.settings = Some(settings.clone());
    }

    fn load_document(&mut self, document: &Document) -> BridgeResult<()> {
        self.document = Some(document.clone());
        if !self.defer_load {
            self.complete_load();
        }
        Ok(())
    }

    fn evaluate_script(&mut self, source: &str, reply_to: Option<ScriptId>) {
        match parse_push(source) {
            Ok(Some(push)) => {
                self.render(push);
                self.reply(reply_to, Ok(Value::Null));
            }
            Ok(None) if source.trim() == HEIGHT_QUERY_SCRIPT => {
                let height = json!(self.height);
                self.reply(reply_to, Ok(height));
            }
            Ok(None) => {
                log::debug!("headless renderer ignoring script: {}", source);
                self.reply(reply_to, Err("unsupported script".to_string()));
            }
            Err(e) => {
                log::warn!("bad push command: {}", e);
                self.reply(reply_to, Err(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(events: &mut RendererEvents) -> Vec<RendererEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn test_parse_both_encodings() {
        let base64 = parse_push("window.updateWithMarkdownContentBase64Encoded(`IyBIaQ==`)")
            .unwrap()
            .unwrap();
        assert_eq!(base64.markdown, "# Hi");
        assert_eq!(base64.sequence, None);

        let escaped = parse_push("window.updateWithMarkdownContent(`a \\` b \\$ c`, 12)")
            .unwrap()
            .unwrap();
        assert_eq!(escaped.markdown, "a ` b $ c");
        assert_eq!(escaped.sequence, Some(12));
    }

    #[test]
    fn test_parse_rejects_broken_commands() {
        assert!(parse_push("window.updateWithMarkdownContent(`open").is_err());
        assert!(parse_push("window.updateWithMarkdownContent(`x`, abc)").is_err());
        assert!(parse_push("window.updateWithMarkdownContentBase64Encoded(`!!`)").is_err());
        assert_eq!(parse_push("console.log(1)").unwrap(), None);
    }

    #[test]
    fn test_markdown_extensions() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_height_estimate() {
        assert_eq!(estimate_height(""), 0.0);
        assert_eq!(estimate_height("<h1>Hi</h1>\n\n<p>x</p>\n"), 2.0 * LINE_HEIGHT);
    }

    #[test]
    fn test_push_posts_rendered_then_size() {
        let (mut renderer, mut events) = HeadlessRenderer::new();
        renderer.evaluate_script("window.updateWithMarkdownContent(`# Title`, 3)", None);

        assert_eq!(renderer.pushes(), ["# Title".to_string()]);
        assert_eq!(renderer.rendered_html(), "<h1>Title</h1>\n");

        let events = drain(&mut events);
        assert_eq!(events.len(), 2);
        match &events[0] {
            RendererEvent::Message { channel, body } => {
                assert_eq!(channel, RENDERED_CONTENT_CHANNEL);
                assert_eq!(body["sequence"], json!(3));
                assert_eq!(
                    body["value"],
                    json!(transport::encode_base64("<h1>Title</h1>\n"))
                );
            }
            other => panic!("unexpected event {:?}", other),
        }
        match &events[1] {
            RendererEvent::Message { channel, body } => {
                assert_eq!(channel, SIZE_CHANGED_CHANNEL);
                assert_eq!(body["value"], json!(LINE_HEIGHT));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_script_replies() {
        let (mut renderer, mut events) = HeadlessRenderer::new();
        renderer.evaluate_script(HEIGHT_QUERY_SCRIPT, Some(ScriptId(1)));
        renderer.evaluate_script("alert(1)", Some(ScriptId(2)));
        renderer.evaluate_script("alert(2)", None);

        let events = drain(&mut events);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            RendererEvent::ScriptCompleted { id: ScriptId(1), result: Ok(v) } if v.as_f64() == Some(0.0)
        ));
        assert!(matches!(
            &events[1],
            RendererEvent::ScriptCompleted { id: ScriptId(2), result: Err(_) }
        ));
    }

    #[test]
    fn test_deferred_load_waits() {
        let (mut renderer, mut events) = HeadlessRenderer::deferred_load();
        let document = crate::bootstrap::build("<p>PLACEHOLDER_SCRIPT PLACEHOLDER_STYLESHEET</p>", "", "")
            .unwrap();
        renderer.load_document(&document).unwrap();
        assert!(drain(&mut events).is_empty());

        renderer.complete_load();
        assert!(matches!(drain(&mut events).as_slice(), [RendererEvent::LoadFinished]));
    }
}
