/*!
`registry.rs` - the discovered command table.

A discovery round turns the provider's `tools/list` answer into
`CommandEntry` values:

  - description   : provider text, or a fixed placeholder
  - params        : from `inputSchema.properties` + `inputSchema.required`
                    (per-property `"required": true` is honoured too);
                    absent or malformed schema -> no parameters
  - rendered_help : `Parameters:` listing + `Example:` invocation

The whole table is swapped on every successful round. A failed round leaves
the previous table untouched.
*/

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::mcp::{DiscoveryError, Provider, Session};

/// Shown when the provider gives no description.
pub const NO_DESCRIPTION: &str = "No description available";

/// Type tag used when a parameter declares none.
pub const ANY_TYPE: &str = "any";

/* ---- Data Structures ---- */

/// One declared parameter of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub type_tag: String,
    pub required: bool,
    pub description: String,
}

/// One discovered capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub rendered_help: String,
}

impl CommandEntry {
    pub fn new(name: impl Into<String>, description: Option<String>, params: Vec<ParamSpec>) -> Self {
        let name = name.into();
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());
        let rendered_help = render_help(&name, &params);
        Self {
            name,
            description,
            params,
            rendered_help,
        }
    }
}

/// Shape of a capability as the provider sends it. Everything optional;
/// defaults are applied in [`build_entries`].
#[derive(Debug, Deserialize)]
struct RawCapability {
    name: Option<String>,
    description: Option<String>,
    #[serde(rename = "inputSchema", alias = "input_schema")]
    input_schema: Option<Value>,
}

/// Command names are restricted to lowercase letters, digits, `-` and `_`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/* ---- Registry ---- */

/// The command table for the current session.
///
/// Names, descriptions and rendered help are views over one ordered entry
/// list, so index `i` always refers to the same command in all three.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<CommandEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[cfg(test)]
    pub fn descriptions(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.description.as_str()).collect()
    }

    #[cfg(test)]
    pub fn rendered_help(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.rendered_help.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Swap in a complete new table.
    pub fn replace(&mut self, entries: Vec<CommandEntry>) {
        self.entries = entries;
    }

    /// Run a discovery round and install its result. On failure the current
    /// table is kept.
    pub async fn refresh<P: Provider>(
        &mut self,
        session: &Session<P>,
    ) -> Result<usize, DiscoveryError> {
        let entries = discover(session).await?;
        self.replace(entries);
        debug!(commands = ?self.names(), "registry refreshed");
        Ok(self.len())
    }

    /// Numbered listing, one command per line (`  1. name - description`).
    pub fn render_listing(&self) -> String {
        if self.is_empty() {
            return "  No commands available (not connected)\n".to_string();
        }
        let mut out = String::new();
        for (idx, entry) in self.entries().iter().enumerate() {
            let desc = entry.description.split_whitespace().collect::<Vec<_>>().join(" ");
            let _ = writeln!(out, "  {}. {} - {}", idx + 1, entry.name, desc);
        }
        out
    }
}

/* ---- Discovery ---- */

/// Ask the provider for its capabilities and build a fresh entry list.
pub async fn discover<P: Provider>(session: &Session<P>) -> Result<Vec<CommandEntry>, DiscoveryError> {
    let provider = session.provider().ok_or(DiscoveryError::NotReady)?;
    let raw = provider.list_capabilities().await?;
    let total = raw.len();
    let entries = build_entries(raw);
    debug!(received = total, accepted = entries.len(), "discovery round complete");
    Ok(entries)
}

/// Convert raw capability objects into entries, in provider order.
/// Capabilities without a usable name are dropped with a warning.
pub fn build_entries(raw: Vec<Value>) -> Vec<CommandEntry> {
    let mut entries = Vec::with_capacity(raw.len());
    for value in raw {
        let cap: RawCapability = match serde_json::from_value(value) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "skipping capability with unexpected shape");
                continue;
            }
        };
        let Some(name) = cap.name.filter(|n| is_valid_name(n)) else {
            warn!("skipping capability with missing or invalid name");
            continue;
        };
        let params = parse_params(cap.input_schema.as_ref());
        entries.push(CommandEntry::new(name, cap.description, params));
    }
    entries
}

/// Read `properties` / `required` out of an input schema. Anything that is not
/// an object with a `properties` map yields no parameters.
pub fn parse_params(schema: Option<&Value>) -> Vec<ParamSpec> {
    let Some(schema) = schema.and_then(Value::as_object) else {
        return Vec::new();
    };
    let Some(props) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    let required: HashSet<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    props
        .iter()
        .map(|(pname, pobj)| {
            let pobj = pobj.as_object();
            let flagged = pobj
                .and_then(|m| m.get("required"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            ParamSpec {
                name: pname.clone(),
                type_tag: pobj
                    .and_then(|m| m.get("type"))
                    .and_then(type_tag)
                    .unwrap_or_else(|| ANY_TYPE.to_string()),
                required: flagged || required.contains(pname.as_str()),
                description: pobj
                    .and_then(|m| m.get("description"))
                    .and_then(Value::as_str)
                    .map(|d| d.split_whitespace().collect::<Vec<_>>().join(" "))
                    .unwrap_or_default(),
            }
        })
        .collect()
}

// "string" -> string, ["string","null"] -> string|null
fn type_tag(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("|"))
        }
        _ => None,
    }
}

/// Detail help for one command. Layout is fixed:
///
/// ```text
/// Parameters:
/// - <key> (required|optional): <type> - <description>
/// Example:
/// <name> {"<key>":"<key>"}
/// ```
pub fn render_help(name: &str, params: &[ParamSpec]) -> String {
    let mut out = String::from("Parameters:\n");
    if params.is_empty() {
        out.push_str("No parameters required\n");
    } else {
        for p in params {
            let _ = writeln!(
                out,
                "- {} ({}): {} - {}",
                p.name,
                if p.required { "required" } else { "optional" },
                p.type_tag,
                p.description
            );
        }
    }
    out.push_str("Example:\n");
    let example: Map<String, Value> = params
        .iter()
        .map(|p| (p.name.clone(), Value::String(format!("<{}>", p.name))))
        .collect();
    let _ = writeln!(out, "{} {}", name, Value::Object(example));
    out
}

/* ---- Tests ---- */
#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::Endpoint;
    use crate::mcp::fake::{FakeProvider, sample_tools};
    use serde_json::json;

    fn assert_aligned(reg: &Registry) {
        let names = reg.names();
        let descs = reg.descriptions();
        let helps = reg.rendered_help();
        assert_eq!(names.len(), descs.len());
        assert_eq!(names.len(), helps.len());
        for (i, entry) in reg.entries().iter().enumerate() {
            assert_eq!(names[i], entry.name);
            assert_eq!(descs[i], entry.description);
            assert_eq!(helps[i], entry.rendered_help);
            assert!(helps[i].contains(&format!("{} {{", entry.name)));
        }
    }

    #[test]
    fn sample_scenario_renders_expected_help() {
        let entries = build_entries(sample_tools());
        assert_eq!(entries.len(), 2);

        let page = &entries[0];
        assert_eq!(page.name, "get_current_page");
        assert_eq!(page.description, NO_DESCRIPTION);
        assert_eq!(
            page.rendered_help,
            "Parameters:\nNo parameters required\nExample:\nget_current_page {}\n"
        );

        let nav = &entries[1];
        assert!(nav.rendered_help.contains("- pageId (required): string -"));
        assert!(
            nav.rendered_help
                .contains(r#"navigate_page {"pageId":"<pageId>"}"#)
        );
    }

    #[test]
    fn help_layout_is_exact() {
        let params = vec![
            ParamSpec {
                name: "depth".into(),
                type_tag: "integer".into(),
                required: false,
                description: "How deep to walk".into(),
            },
            ParamSpec {
                name: "nodeId".into(),
                type_tag: "string".into(),
                required: true,
                description: "Target node".into(),
            },
        ];
        assert_eq!(
            render_help("get_node", &params),
            "Parameters:\n\
             - depth (optional): integer - How deep to walk\n\
             - nodeId (required): string - Target node\n\
             Example:\n\
             get_node {\"depth\":\"<depth>\",\"nodeId\":\"<nodeId>\"}\n"
        );
    }

    #[test]
    fn parameters_keep_declaration_order() {
        let tool: Value = serde_json::from_str(
            r#"{"name": "resize_frame", "inputSchema": {"properties": {
                "width": {"type": "number"},
                "height": {"type": "number"},
                "name": {"type": "string"}
            }}}"#,
        )
        .unwrap();
        let entries = build_entries(vec![tool]);
        let names: Vec<&str> = entries[0].params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["width", "height", "name"]);
        assert!(entries[0].rendered_help.contains(
            r#"resize_frame {"width":"<width>","height":"<height>","name":"<name>"}"#
        ));
        let help = &entries[0].rendered_help;
        let at = |k: &str| help.find(&format!("- {k} (")).unwrap();
        assert!(at("width") < at("height") && at("height") < at("name"));
    }

    #[test]
    fn missing_type_defaults_to_any() {
        let params = parse_params(Some(&json!({
            "properties": {"x": {"description": "free"}}
        })));
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].type_tag, ANY_TYPE);
        assert!(!params[0].required);
    }

    #[test]
    fn union_type_is_joined() {
        let params = parse_params(Some(&json!({
            "properties": {"x": {"type": ["string", "null"]}}
        })));
        assert_eq!(params[0].type_tag, "string|null");
    }

    #[test]
    fn malformed_schema_means_no_parameters() {
        assert!(parse_params(None).is_empty());
        assert!(parse_params(Some(&json!("nope"))).is_empty());
        assert!(parse_params(Some(&json!({"properties": []}))).is_empty());
        assert!(parse_params(Some(&json!({"type": "object"}))).is_empty());
    }

    #[test]
    fn snake_case_schema_key_is_accepted() {
        let entries = build_entries(vec![json!({
            "name": "set_fill",
            "input_schema": {"properties": {"color": {"type": "string"}}, "required": ["color"]}
        })]);
        assert_eq!(entries[0].params.len(), 1);
        assert!(entries[0].params[0].required);
    }

    #[test]
    fn invalid_names_are_skipped() {
        let entries = build_entries(vec![
            json!({"name": "GetPage"}),
            json!({"name": "has space"}),
            json!({"description": "nameless"}),
            json!({"name": 42}),
            json!({"name": "ok-name_2"}),
        ]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ok-name_2");
    }

    #[test]
    fn blank_description_gets_placeholder() {
        let entries = build_entries(vec![json!({"name": "a", "description": "   "})]);
        assert_eq!(entries[0].description, NO_DESCRIPTION);
    }

    #[test]
    fn listing_is_numbered_from_one() {
        let mut reg = Registry::new();
        reg.replace(build_entries(sample_tools()));
        let listing = reg.render_listing();
        assert!(listing.contains("1. get_current_page - No description available"));
        assert!(listing.contains("2. navigate_page - Navigate to a page"));
    }

    #[test]
    fn empty_listing_says_not_connected() {
        assert!(Registry::new().render_listing().contains("not connected"));
    }

    #[tokio::test]
    async fn refresh_replaces_wholesale() {
        let fake = FakeProvider::new(sample_tools());
        let session = Session::ready(Endpoint::default(), fake);
        let mut reg = Registry::new();

        assert_eq!(reg.refresh(&session).await.unwrap(), 2);
        assert_aligned(&reg);

        session
            .provider()
            .unwrap()
            .set_tools(vec![json!({"name": "export_frame"})]);
        assert_eq!(reg.refresh(&session).await.unwrap(), 1);
        assert_eq!(reg.names(), vec!["export_frame"]);
        assert!(reg.get("navigate_page").is_none());
        assert_aligned(&reg);

        session.provider().unwrap().set_tools(vec![]);
        assert_eq!(reg.refresh(&session).await.unwrap(), 0);
        assert!(reg.is_empty());
        assert_aligned(&reg);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_table() {
        let fake = FakeProvider::new(sample_tools());
        let session = Session::ready(Endpoint::default(), fake);
        let mut reg = Registry::new();
        reg.refresh(&session).await.unwrap();

        session.provider().unwrap().set_discovery_failure(true);
        assert!(reg.refresh(&session).await.is_err());
        assert_eq!(reg.len(), 2);
        assert_aligned(&reg);
    }

    #[tokio::test]
    async fn discovery_requires_ready_session() {
        let fake = FakeProvider::new(sample_tools());
        let mut session = Session::ready(Endpoint::default(), fake);
        session.disconnect().await;
        let err = discover(&session).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::NotReady));
    }
}
