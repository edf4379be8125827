//! Content decoding
//!
//! `contentEncoding`/`contentMediaType` processing is delegated to a codec.
//! The default handles `base64` transfer encoding and the
//! `application/json` media type; anything else passes through untouched.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{ErrorKind, InvalidValue};
use crate::value::Node;

/// Codec for schema-annotated string content.
pub trait ContentCodec {
    /// Decode (`decode == true`) or re-encode a value. Decoding failures are
    /// content-constraint violations.
    fn process(
        &self,
        encoding: Option<&str>,
        media_type: Option<&str>,
        value: &Node,
        decode: bool,
    ) -> Result<Node, InvalidValue>;
}

/// Default codec: `base64` + `application/json`.
#[derive(Debug, Default)]
pub struct Base64JsonCodec;

impl ContentCodec for Base64JsonCodec {
    fn process(
        &self,
        encoding: Option<&str>,
        media_type: Option<&str>,
        value: &Node,
        decode: bool,
    ) -> Result<Node, InvalidValue> {
        if decode {
            // Content keywords only constrain strings.
            let Node::String(text) = value else {
                return Ok(value.clone());
            };
            let mut text = text.clone();
            if encoding == Some("base64") {
                let bytes = BASE64.decode(text.as_bytes()).map_err(|e| {
                    InvalidValue::new(ErrorKind::Content, format!("Invalid base64 content: {e}"))
                })?;
                text = String::from_utf8(bytes).map_err(|_| {
                    InvalidValue::new(ErrorKind::Content, "Base64 content is not valid UTF-8")
                })?;
            }
            if media_type == Some("application/json") {
                let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                    InvalidValue::new(
                        ErrorKind::Content,
                        format!("Invalid application/json content: {e}"),
                    )
                })?;
                return Ok(Node::from_value(&parsed));
            }
            Ok(Node::String(text))
        } else {
            let mut text = match (media_type, value) {
                (Some("application/json"), _) => serde_json::to_string(&value.to_value())
                    .map_err(|e| {
                        InvalidValue::new(
                            ErrorKind::Content,
                            format!("Cannot encode application/json content: {e}"),
                        )
                    })?,
                (_, Node::String(s)) => s.clone(),
                _ => return Ok(value.clone()),
            };
            if encoding == Some("base64") {
                text = BASE64.encode(text.as_bytes());
            }
            Ok(Node::String(text))
        }
    }
}
