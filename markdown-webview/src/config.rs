//! View configuration. Every field has a default, so an empty JSON object is a valid config.

use std::env;
use std::fs;

use serde::{Deserialize, Serialize};

use crate::bootstrap::StylesheetVariant;
use crate::error::{BridgeError, BridgeResult};
use crate::message::DEFAULT_MAX_MESSAGE_BYTES;
use crate::renderer::SurfaceSettings;
use crate::sync::ReplyTagging;
use crate::transport::TransportEncoding;

/// Environment variable naming a JSON config file, read by [`ViewConfig::from_env`].
pub const CONFIG_ENV_VAR: &str = "MARKDOWN_WEBVIEW_CONFIG";

/// Where content height updates come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightTracking {
    /// Only `sizeChangeHandler` messages posted by the page.
    #[default]
    Messages,
    /// Additionally query `document.body.scrollHeight` after every push.
    PollAfterPush,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub transport: TransportEncoding,
    pub reply_tagging: ReplyTagging,
    pub height_tracking: HeightTracking,
    pub stylesheet: StylesheetVariant,
    pub max_message_bytes: usize,
    pub surface: SurfaceSettings,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            transport: TransportEncoding::default(),
            reply_tagging: ReplyTagging::default(),
            height_tracking: HeightTracking::default(),
            stylesheet: StylesheetVariant::default(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            surface: SurfaceSettings::default(),
        }
    }
}

impl ViewConfig {
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads the file named by `MARKDOWN_WEBVIEW_CONFIG`, or the defaults when unset.
    pub fn from_env() -> BridgeResult<Self> {
        Self::from_var(env::var(CONFIG_ENV_VAR))
    }

    fn from_var(var: Result<String, env::VarError>) -> BridgeResult<Self> {
        match var {
            Ok(path) => {
                let json = fs::read_to_string(&path).map_err(|e| {
                    BridgeError::Config(format!("Failed to read {}: {}", path, e))
                })?;
                Self::from_json(&json)
            }
            Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => Err(BridgeError::Config(format!("{}: {}", CONFIG_ENV_VAR, e))),
        }
    }
}
