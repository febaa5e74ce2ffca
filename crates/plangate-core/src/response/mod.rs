//! Response assembly and string normalization.
//!
//! The final envelope merges the parse fields, the validator's captured
//! output, and an `error: false` flag. Every top-level string value goes
//! through one total normalization function, and the envelope is a
//! `serde_json::Map` (BTree-backed), so serialization emits keys in sorted
//! order for deterministic, diffable responses.

use serde_json::{Map, Value};

/// The final response mapping, serialized with sorted keys.
pub type ResponseEnvelope = Map<String, Value>;

/// Replace literal `\t` and `\n` escape sequences with two spaces.
///
/// Applied uniformly to every string-valued response field (and to captured
/// process output attached to failure responses) so embedded escape
/// sequences cannot break up the response body.
pub fn normalize_field(value: &str) -> String {
    value.replace("\\t", "  ").replace("\\n", "  ")
}

/// Merge parse fields and validator output into the success envelope.
pub fn assemble(parse_fields: Map<String, Value>, validator_output: &str) -> ResponseEnvelope {
    let mut envelope = parse_fields;
    envelope.insert(
        "validator".to_string(),
        Value::String(validator_output.to_string()),
    );
    envelope.insert("error".to_string(), Value::Bool(false));

    for value in envelope.values_mut() {
        if let Value::String(s) = value {
            *s = normalize_field(s);
        }
    }

    envelope
}
