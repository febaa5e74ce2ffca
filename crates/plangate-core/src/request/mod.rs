//! Request payload validation and transport-escape decoding.
//!
//! Clients send `domain` and `problem` as backslash-escaped text (literal
//! `\n`, `\t`, `\"` sequences rather than raw control characters). This
//! module checks the required fields are present and decodes the escaped
//! representation into raw text ready to be written to the workspace files.

use serde_json::Value;
use thiserror::Error;

/// Errors produced while validating and decoding a request payload.
///
/// All variants map to HTTP 400. The `Display` strings for the missing-field
/// cases are part of the public API contract and must not be reworded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Query parameters `domain` and `problem` are missing.")]
    MalformedBody,

    #[error("{0} was not found in the query parameters.")]
    MissingField(&'static str),

    #[error("invalid escape sequence in `{field}` at byte {position}: {detail}")]
    Encoding {
        field: &'static str,
        position: usize,
        detail: String,
    },
}

/// A validated request with both text fields decoded.
#[derive(Debug, Clone)]
pub struct PlanningRequest {
    /// Decoded planning-domain text.
    pub domain: String,
    /// Decoded planning-problem text.
    pub problem: String,
    /// Requested solver mode, if any. Passed through verbatim; unrecognized
    /// values fall back to the default profile during selection.
    pub mode: Option<String>,
}

impl PlanningRequest {
    /// Validate a JSON request body and decode its text fields.
    ///
    /// Fails if the body is not an object, if `domain` or `problem` is
    /// absent or not a string, or if either field carries a malformed
    /// escape sequence.
    pub fn from_json(body: &Value) -> Result<Self, RequestError> {
        let object = body.as_object().ok_or(RequestError::MalformedBody)?;

        let domain = object
            .get("domain")
            .and_then(Value::as_str)
            .ok_or(RequestError::MissingField("Domain"))?;
        let problem = object
            .get("problem")
            .and_then(Value::as_str)
            .ok_or(RequestError::MissingField("Problem"))?;
        let mode = object
            .get("mode")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(Self {
            domain: decode_escapes("domain", domain)?,
            problem: decode_escapes("problem", problem)?,
            mode,
        })
    }
}

/// Decode a backslash-escaped transport string into raw text.
///
/// Recognizes `\n`, `\t`, `\r`, `\0`, `\\`, `\"`, `\'`, `\xNN`, and
/// `\uNNNN`. Unrecognized escapes pass through unchanged (backslash kept),
/// matching the permissive decoder the service has always used. A truncated
/// escape or invalid hex digits are an error.
pub fn decode_escapes(field: &'static str, input: &str) -> Result<String, RequestError> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices();

    while let Some((position, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some((_, escape)) = chars.next() else {
            return Err(RequestError::Encoding {
                field,
                position,
                detail: "truncated escape at end of input".to_string(),
            });
        };

        match escape {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            'x' => out.push(decode_hex_escape(field, position, &mut chars, 2)?),
            'u' => out.push(decode_hex_escape(field, position, &mut chars, 4)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Ok(out)
}

/// Read `digits` hex digits from the iterator and convert them to a char.
fn decode_hex_escape(
    field: &'static str,
    position: usize,
    chars: &mut std::str::CharIndices<'_>,
    digits: u32,
) -> Result<char, RequestError> {
    let mut value: u32 = 0;
    for _ in 0..digits {
        let Some((_, c)) = chars.next() else {
            return Err(RequestError::Encoding {
                field,
                position,
                detail: format!("expected {digits} hex digits"),
            });
        };
        let Some(digit) = c.to_digit(16) else {
            return Err(RequestError::Encoding {
                field,
                position,
                detail: format!("invalid hex digit {c:?}"),
            });
        };
        value = value * 16 + digit;
    }

    char::from_u32(value).ok_or_else(|| RequestError::Encoding {
        field,
        position,
        detail: format!("\\u{value:04x} is not a valid character"),
    })
}
