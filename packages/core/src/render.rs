//! Decoding and human-readable rendering of contract results.
//!
//! The contract returns raw bytes. They are decoded as UTF-8 (lossily, so a
//! malformed payload is still displayable) and, when the text is JSON,
//! parsed into a generic [`serde_json::Value`] for pretty printing. The
//! output is a terminal transcript, not a stable format.

use serde_json::Value;

use crate::types::Step;
use crate::validation::ExpectationError;

/// A contract result decoded for display.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    /// The payload as UTF-8 text; invalid sequences become U+FFFD.
    pub text: String,
    json: Result<Value, String>,
}

impl DecodedPayload {
    pub fn decode(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes).into_owned();
        let json = serde_json::from_str::<Value>(&text).map_err(|e| e.to_string());
        Self { text, json }
    }

    /// The parsed JSON value, if the text is JSON.
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref().ok()
    }

    pub(crate) fn json_value(&self) -> Result<&Value, ExpectationError> {
        self.json
            .as_ref()
            .map_err(|e| ExpectationError::NotJson(e.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Render a decoded payload for the `*** Result:` line.
///
/// JSON objects and arrays are pretty printed; JSON scalars and plain text
/// are shown as-is.
pub fn render_payload(payload: &DecodedPayload) -> String {
    match payload.json() {
        Some(value @ (Value::Object(_) | Value::Array(_))) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| payload.text.clone())
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => payload.text.clone(),
    }
}

/// The transcript header printed before a step runs.
///
/// ```text
/// --> Submit Transaction: CreateUser, creates new user
/// ```
pub fn render_step_header(step: &Step) -> String {
    match &step.description {
        Some(d) => format!(
            "--> {} Transaction: {}, {}",
            step.kind.verb(),
            step.transaction,
            d
        ),
        None => format!("--> {} Transaction: {}", step.kind.verb(), step.transaction),
    }
}

/// Render `(name, value)` rows as an aligned parameter table.
///
/// ```text
/// channelName:       mychannel
/// chaincodeName:     utopiamaker
/// ```
pub fn render_parameters(rows: &[(&str, String)]) -> String {
    let width = rows
        .iter()
        .map(|(name, _)| name.len() + 1)
        .max()
        .unwrap_or(0)
        .max(18);
    let mut out = String::new();
    for (name, value) in rows {
        let label = format!("{name}:");
        out.push_str(&format!("{label:<width$} {value}\n", width = width));
    }
    out
}
