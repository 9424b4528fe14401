//! Builds the self-contained page the renderer loads once: template + bridge script + stylesheet.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};
use crate::renderer::{Renderer, SurfaceSettings};

pub const SCRIPT_PLACEHOLDER: &str = "PLACEHOLDER_SCRIPT";
pub const STYLESHEET_PLACEHOLDER: &str = "PLACEHOLDER_STYLESHEET";

const BUNDLED_TEMPLATE: &str = include_str!("../assets/template.html");
const BUNDLED_SCRIPT: &str = include_str!("../assets/script.js");
const DESKTOP_STYLESHEET: &str = include_str!("../assets/stylesheets/default-desktop.css");
const MOBILE_STYLESHEET: &str = include_str!("../assets/stylesheets/default-mobile.css");

/// Which bundled default stylesheet to use when no custom one is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StylesheetVariant {
    Desktop,
    Mobile,
}

impl Default for StylesheetVariant {
    fn default() -> Self {
        if cfg!(any(target_os = "ios", target_os = "android")) {
            StylesheetVariant::Mobile
        } else {
            StylesheetVariant::Desktop
        }
    }
}

impl StylesheetVariant {
    pub fn bundled_stylesheet(self) -> &'static str {
        match self {
            StylesheetVariant::Desktop => DESKTOP_STYLESHEET,
            StylesheetVariant::Mobile => MOBILE_STYLESHEET,
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            StylesheetVariant::Desktop => "default-desktop.css",
            StylesheetVariant::Mobile => "default-mobile.css",
        }
    }
}

/// A fully substituted HTML page with no external references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    html: String,
}

impl Document {
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }
}

/// The three text blobs a page is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAssets {
    pub template: String,
    pub script: String,
    pub stylesheet: String,
}

impl PageAssets {
    /// Assets compiled into the crate.
    pub fn bundled(variant: StylesheetVariant) -> Self {
        Self {
            template: BUNDLED_TEMPLATE.to_string(),
            script: BUNDLED_SCRIPT.to_string(),
            stylesheet: variant.bundled_stylesheet().to_string(),
        }
    }

    /// Reads `template.html`, `script.js` and `stylesheets/default-<variant>.css` from `dir`.
    pub fn from_dir(dir: &Path, variant: StylesheetVariant) -> BridgeResult<Self> {
        Ok(Self {
            template: read_asset(&dir.join("template.html"))?,
            script: read_asset(&dir.join("script.js"))?,
            stylesheet: read_asset(&dir.join("stylesheets").join(variant.file_name()))?,
        })
    }

    /// Replaces the stylesheet; used for the host's custom stylesheet.
    pub fn with_stylesheet(mut self, stylesheet: impl Into<String>) -> Self {
        self.stylesheet = stylesheet.into();
        self
    }

    /// Prepends a converter library (e.g. a bundled Markdown-to-HTML script) to the bridge script.
    pub fn with_converter_script(mut self, converter: &str) -> Self {
        self.script = format!("{}\n;\n{}", converter, self.script);
        self
    }
}

fn read_asset(path: &Path) -> BridgeResult<String> {
    fs::read_to_string(path).map_err(|e| BridgeError::AssetUnreadable {
        name: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Substitutes the script and stylesheet into `template` in a single pass.
///
/// Text inserted for one placeholder is never rescanned, so a script that happens to
/// contain `PLACEHOLDER_STYLESHEET` is left intact. Both placeholders must be present.
pub fn build(template: &str, script: &str, stylesheet: &str) -> BridgeResult<Document> {
    for placeholder in [SCRIPT_PLACEHOLDER, STYLESHEET_PLACEHOLDER] {
        if !template.contains(placeholder) {
            return Err(BridgeError::MissingPlaceholder {
                placeholder: placeholder.to_string(),
            });
        }
    }

    let mut html = String::with_capacity(template.len() + script.len() + stylesheet.len());
    let mut rest = template;
    loop {
        let next_script = rest.find(SCRIPT_PLACEHOLDER);
        let next_style = rest.find(STYLESHEET_PLACEHOLDER);
        let (at, token, replacement) = match (next_script, next_style) {
            (Some(s), Some(c)) if s < c => (s, SCRIPT_PLACEHOLDER, script),
            (_, Some(c)) => (c, STYLESHEET_PLACEHOLDER, stylesheet),
            (Some(s), None) => (s, SCRIPT_PLACEHOLDER, script),
            (None, None) => break,
        };
        html.push_str(&rest[..at]);
        html.push_str(replacement);
        rest = &rest[at + token.len()..];
    }
    html.push_str(rest);

    Ok(Document { html })
}

/// Single-shot page loader. Consumed by [`PageBootstrapper::bootstrap`], so a renderer
/// driven through it receives exactly one load.
pub struct PageBootstrapper {
    assets: BridgeResult<PageAssets>,
    settings: SurfaceSettings,
}

impl PageBootstrapper {
    pub fn new(assets: BridgeResult<PageAssets>, settings: SurfaceSettings) -> Self {
        Self { assets, settings }
    }

    /// Configures the surface, builds the page and issues the load.
    ///
    /// On error nothing is loaded and the renderer stays blank.
    pub fn bootstrap<R: Renderer + ?Sized>(self, renderer: &mut R) -> BridgeResult<Document> {
        let assets = self.assets?;
        let document = build(&assets.template, &assets.script, &assets.stylesheet)?;
        renderer.configure(&self.settings);
        renderer.load_document(&document)?;
        log::debug!("issued page load ({} bytes)", document.html().len());
        Ok(document)
    }
}
