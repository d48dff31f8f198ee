/*!
`dispatch.rs` - route one request to the provider.

  - parse_request   : "<name> [-h | <json>]" -> Request
  - parse_arguments : None / "" / "   " -> {} ; otherwise exactly one JSON object
  - invoke          : parse, call, surface provider-side errors
  - detail_help     : `<name> -h`, served from the registry only

The registry is not consulted before invoking; the provider decides whether a
name exists.
*/

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info};

use crate::cmd::registry::Registry;
use crate::mcp::{InvocationError, JsonObject, Provider, Session};

/// Token that turns a command line into a detail-help request.
pub const HELP_FLAG: &str = "-h";

/* ---- Request parsing ---- */

/// What a non-control input line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    DetailHelp { name: &'a str },
    Invoke { name: &'a str, args: Option<&'a str> },
}

/// Split a trimmed input line into command name and the rest.
///
/// The rest is kept whole (JSON may contain spaces). Returns `None` for a
/// blank line.
pub fn parse_request(line: &str) -> Option<Request<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (line, None),
    };
    Some(match rest {
        Some(HELP_FLAG) => Request::DetailHelp { name },
        args => Request::Invoke { name, args },
    })
}

/// Turn the raw argument text into the object sent to the provider.
pub fn parse_arguments(raw: Option<&str>) -> Result<JsonObject, InvocationError> {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(JsonObject::new());
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(InvocationError::MalformedArguments(format!(
            "arguments must be a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(InvocationError::MalformedArguments(format!(
            "invalid JSON arguments: {e}"
        ))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/* ---- Invocation ---- */

/// Invoke `name` with already-parsed arguments.
pub async fn invoke_parsed<P: Provider>(
    session: &Session<P>,
    name: &str,
    arguments: JsonObject,
) -> Result<Value, InvocationError> {
    let provider = session
        .provider()
        .ok_or_else(|| InvocationError::ExecutionFailed("session is not ready".into()))?;

    let started = Instant::now();
    let shown = Value::Object(arguments.clone());
    debug!(tool = name, arguments = %shown, "dispatching");
    let outcome = provider.call(name, arguments).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let value = outcome?;
    if let Some(message) = provider_error(&value) {
        info!(tool = name, elapsed_ms, "provider rejected call");
        return Err(InvocationError::ExecutionFailed(message));
    }
    info!(tool = name, elapsed_ms, "call complete");
    Ok(value)
}

/// Parse `raw` and invoke `name`. Malformed arguments never reach the
/// provider.
pub async fn invoke<P: Provider>(
    session: &Session<P>,
    name: &str,
    raw: Option<&str>,
) -> Result<Value, InvocationError> {
    let arguments = parse_arguments(raw)?;
    invoke_parsed(session, name, arguments).await
}

/// A call result flagged `isError` carries its failure text as content.
pub fn provider_error(result: &Value) -> Option<String> {
    if result.get("isError").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let text: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|c| c.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    Some(if text.is_empty() {
        "provider reported an error without details".to_string()
    } else {
        text.join("\n")
    })
}

/// Pretty-printed result for display.
pub fn render_result(result: &Value) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string())
}

/* ---- Detail help ---- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailHelp {
    Known(String),
    Unknown(String),
}

impl DetailHelp {
    pub fn text(&self) -> &str {
        match self {
            DetailHelp::Known(t) | DetailHelp::Unknown(t) => t,
        }
    }
}

/// Help for `name`, or an unknown-command notice followed by every known
/// command.
pub fn detail_help(registry: &Registry, name: &str) -> DetailHelp {
    match registry.get(name) {
        Some(entry) => DetailHelp::Known(format!(
            "{} - {}\n\n{}",
            entry.name, entry.description, entry.rendered_help
        )),
        None => DetailHelp::Unknown(format!(
            "Unknown command: {name}\n\nAvailable commands:\n{}",
            registry.render_listing()
        )),
    }
}

/* ---- Tests ---- */
