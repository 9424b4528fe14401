//! Transport encodings for moving text across the host/renderer boundary.
//! Every encoding here must round-trip arbitrary text exactly.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// How Markdown content is embedded into the push command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportEncoding {
    /// Whole payload is base64 of its UTF-8 bytes; the page decodes before use.
    #[default]
    Base64,
    /// Payload is the text itself with template-literal delimiters escaped.
    Escaped,
}

impl TransportEncoding {
    pub fn encode(self, text: &str) -> String {
        match self {
            TransportEncoding::Base64 => encode_base64(text),
            TransportEncoding::Escaped => escape_template_literal(text),
        }
    }

    pub fn decode(self, payload: &str) -> Result<String, DecodeError> {
        match self {
            TransportEncoding::Base64 => decode_base64(payload),
            TransportEncoding::Escaped => unescape_template_literal(payload),
        }
    }
}

/// Base64 (standard alphabet, padded) of the UTF-8 bytes of `text`.
pub fn encode_base64(text: &str) -> String {
    BASE64_STANDARD.encode(text.as_bytes())
}

/// Inverse of [`encode_base64`]. Rejects bad alphabet, bad padding and non-UTF-8 bytes.
pub fn decode_base64(payload: &str) -> Result<String, DecodeError> {
    let bytes = BASE64_STANDARD.decode(payload.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}

/// Escapes `text` so it can sit between backticks in a script command.
///
/// Backslash, backtick and `$` (which would open `${...}`) are escaped. Carriage
/// returns are written as `\r` because template literals normalise raw CR/CRLF to LF.
pub fn escape_template_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' => out.push_str("\\$"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

/// Inverse of [`escape_template_literal`]. Only the escapes it produces are accepted.
pub fn unescape_template_literal(literal: &str) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('\\') => out.push('\\'),
                Some('`') => out.push('`'),
                Some('$') => out.push('$'),
                Some('r') => out.push('\r'),
                Some(other) => {
                    return Err(DecodeError::MalformedLiteral(format!(
                        "unsupported escape '\\{}'",
                        other
                    )))
                }
                None => {
                    return Err(DecodeError::MalformedLiteral(
                        "dangling backslash".to_string(),
                    ))
                }
            },
            '`' => {
                return Err(DecodeError::MalformedLiteral(
                    "unescaped backtick".to_string(),
                ))
            }
            _ => out.push(ch),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRICKY: &[&str] = &[
        "",
        "# Hi",
        "`code` and ```fenced```",
        "line one\nline two\r\nline three\r",
        "${window.alert(1)} \\` \\\\",
        "Unicode: héllo, 日本語, emoji 🚀, \u{2028}",
        "\u{0}\u{1}\u{7f}",
    ];

    #[test]
    fn test_base64_round_trip() {
        for text in TRICKY {
            let encoded = encode_base64(text);
            assert!(!encoded.contains('`'));
            assert_eq!(decode_base64(&encoded).unwrap(), *text);
        }
    }

    #[test]
    fn test_escaped_round_trip() {
        for text in TRICKY {
            let escaped = escape_template_literal(text);
            assert_eq!(unescape_template_literal(&escaped).unwrap(), *text);
        }
    }

    #[test]
    fn test_escaped_never_contains_bare_delimiter() {
        let escaped = escape_template_literal("a`b${c}\\`");
        let mut prev_backslashes = 0;
        for ch in escaped.chars() {
            if ch == '`' || ch == '$' {
                assert_eq!(prev_backslashes % 2, 1, "unescaped delimiter in {}", escaped);
            }
            prev_backslashes = if ch == '\\' { prev_backslashes + 1 } else { 0 };
        }
    }

    #[test]
    fn test_multi_megabyte_round_trip() {
        let big = "`tick` ${x} ünïcödé\n".repeat(150_000);
        assert!(big.len() > 3 * 1024 * 1024);
        assert_eq!(decode_base64(&encode_base64(&big)).unwrap(), big);
        assert_eq!(
            unescape_template_literal(&escape_template_literal(&big)).unwrap(),
            big
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_base64("not base64!"), Err(DecodeError::Base64(_))));
        // 0xff 0xfe is not UTF-8
        assert_eq!(decode_base64("//4="), Err(DecodeError::Utf8));
        assert!(matches!(
            unescape_template_literal("bad \\n escape"),
            Err(DecodeError::MalformedLiteral(_))
        ));
        assert!(matches!(
            unescape_template_literal("trailing \\"),
            Err(DecodeError::MalformedLiteral(_))
        ));
    }

    #[test]
    fn test_encoding_dispatch() {
        assert_eq!(TransportEncoding::Base64.encode("# Hi"), "IyBIaQ==");
        assert_eq!(TransportEncoding::Escaped.encode("a`b"), "a\\`b");
        assert_eq!(TransportEncoding::Base64.decode("IyBIaQ==").unwrap(), "# Hi");
    }
}
