//! Plugin manifest parsing for `.github/plugin/plugin.json`
//!
//! Two schemas exist in the wild:
//!
//! - legacy: an `items` array of `{ "path", "kind" }` objects
//! - shorthand: `agents` / `skills` arrays of sub-paths relative to the plugin
//!
//! Both are resolved once, at parse time, into a single `Vec<PluginItem>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::category::Category;

/// Manifest location beneath a plugin directory
pub const MANIFEST_PATH: &str = ".github/plugin/plugin.json";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("manifest must be a JSON object")]
    NotAnObject,

    #[error("manifest is missing required field \"{field}\" (non-empty string)")]
    MissingField { field: &'static str },

    #[error("field \"{field}\" must be an array")]
    NotAnArray { field: &'static str },

    #[error("items[{index}]: {reason}")]
    InvalidItem { index: usize, reason: String },

    #[error("{field}[{index}] must be a non-empty string")]
    InvalidShorthand { field: &'static str, index: usize },

    #[error("manifest must declare \"items\" (or \"agents\"/\"skills\")")]
    MissingItems,
}

/// Kind of a single plugin item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Instruction,
    Prompt,
    Agent,
    Skill,
}

impl ItemKind {
    pub const ALLOWED: &'static [&'static str] = &["instruction", "prompt", "agent", "skill"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instruction => "instruction",
            Self::Prompt => "prompt",
            Self::Agent => "agent",
            Self::Skill => "skill",
        }
    }

    /// Local category folder the item lands in
    pub fn category(&self) -> Category {
        match self {
            Self::Instruction => Category::Instructions,
            Self::Prompt => Category::Prompts,
            Self::Agent => Category::Agents,
            Self::Skill => Category::Skills,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instruction" => Ok(Self::Instruction),
            "prompt" => Ok(Self::Prompt),
            "agent" => Ok(Self::Agent),
            "skill" => Ok(Self::Skill),
            other => Err(format!(
                "kind \"{}\" is not one of {}",
                other,
                Self::ALLOWED.join(", ")
            )),
        }
    }
}

/// One downloadable unit of a plugin, path is repository-relative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginItem {
    pub path: String,
    pub kind: ItemKind,
}

/// Author information: either a bare name or an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Author {
    Name(String),
    Details {
        name: Option<String>,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

impl Author {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(n) => Some(n),
            Self::Details { name, .. } => name.as_deref(),
        }
    }
}

/// Validated plugin manifest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: Option<String>,
    pub author: Option<Author>,
    pub repository: Option<String>,
    pub license: Option<String>,
    pub featured: bool,
    pub tags: Vec<String>,
    pub items: Vec<PluginItem>,
    pub display: Option<Value>,
}

/// Item declaration as found in the manifest, before normalization
enum ItemSource {
    Legacy(Vec<PluginItem>),
    Shorthand {
        agents: Vec<String>,
        skills: Vec<String>,
    },
}

impl ItemSource {
    fn into_items(self, containing_dir: &str) -> Vec<PluginItem> {
        match self {
            Self::Legacy(items) => items,
            Self::Shorthand { agents, skills } => agents
                .into_iter()
                .map(|p| (p, ItemKind::Agent))
                .chain(skills.into_iter().map(|p| (p, ItemKind::Skill)))
                .map(|(p, kind)| PluginItem {
                    path: join_repo_path(containing_dir, &normalize_subpath(&p)),
                    kind,
                })
                .collect(),
        }
    }
}

/// Parse and validate a manifest found in `containing_dir` (repository-relative).
pub fn parse_manifest(raw: &str, containing_dir: &str) -> Result<PluginManifest, ManifestError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ManifestError::InvalidJson(e.to_string()))?;
    let obj = value.as_object().ok_or(ManifestError::NotAnObject)?;

    let name = required_string(obj, "name")?;
    let description = required_string(obj, "description")?;
    let source = item_source(obj)?;

    let containing_dir = containing_dir.trim().trim_matches('/');
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default_id(containing_dir, &name));

    Ok(PluginManifest {
        id,
        name,
        description,
        version: optional_string(obj, "version"),
        author: obj
            .get("author")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok()),
        repository: optional_string(obj, "repository"),
        license: optional_string(obj, "license"),
        featured: obj.get("featured").and_then(Value::as_bool).unwrap_or(false),
        tags: obj
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        items: source.into_items(containing_dir),
        display: obj.get("display").cloned(),
    })
}

/// Repository path of the manifest for a plugin directory
pub fn manifest_path(plugin_dir: &str) -> String {
    join_repo_path(plugin_dir.trim_matches('/'), MANIFEST_PATH)
}

fn required_string(obj: &Map<String, Value>, field: &'static str) -> Result<String, ManifestError> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ManifestError::MissingField { field })
}

fn optional_string(obj: &Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn item_source(obj: &Map<String, Value>) -> Result<ItemSource, ManifestError> {
    if let Some(items) = obj.get("items") {
        let items = items
            .as_array()
            .ok_or(ManifestError::NotAnArray { field: "items" })?;
        return items
            .iter()
            .enumerate()
            .map(|(index, item)| legacy_item(index, item))
            .collect::<Result<Vec<_>, _>>()
            .map(ItemSource::Legacy);
    }

    let agents = shorthand(obj, "agents")?;
    let skills = shorthand(obj, "skills")?;
    match (agents, skills) {
        (None, None) => Err(ManifestError::MissingItems),
        (agents, skills) => Ok(ItemSource::Shorthand {
            agents: agents.unwrap_or_default(),
            skills: skills.unwrap_or_default(),
        }),
    }
}

fn legacy_item(index: usize, item: &Value) -> Result<PluginItem, ManifestError> {
    let invalid = |reason: String| ManifestError::InvalidItem { index, reason };

    let obj = item
        .as_object()
        .ok_or_else(|| invalid("must be an object".to_string()))?;
    let path = obj
        .get("path")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("\"path\" must be a non-empty string".to_string()))?;
    let kind = obj
        .get("kind")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("\"kind\" must be a non-empty string".to_string()))?;
    let kind = kind.parse::<ItemKind>().map_err(invalid)?;

    Ok(PluginItem {
        path: path.trim_start_matches("./").to_string(),
        kind,
    })
}

/// Shorthand arrays; a single string is accepted as a one-element array
fn shorthand(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Vec<String>>, ManifestError> {
    let values = match obj.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => vec![Value::String(s.clone())],
        Some(Value::Array(values)) => values.clone(),
        Some(_) => return Err(ManifestError::NotAnArray { field }),
    };

    values
        .iter()
        .enumerate()
        .map(|(index, v)| {
            v.as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or(ManifestError::InvalidShorthand { field, index })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// `./skills/foo/` -> `skills/foo`
fn normalize_subpath(path: &str) -> String {
    path.trim()
        .trim_start_matches("./")
        .trim_end_matches('/')
        .to_string()
}

fn join_repo_path(dir: &str, sub: &str) -> String {
    match (dir.is_empty(), sub.is_empty()) {
        (true, _) => sub.to_string(),
        (false, true) => dir.to_string(),
        (false, false) => format!("{}/{}", dir, sub),
    }
}

fn default_id(containing_dir: &str, name: &str) -> String {
    containing_dir
        .rsplit('/')
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| name.to_lowercase().replace(char::is_whitespace, "-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_json_is_reported() {
        let err = parse_manifest("{ not json", "plugins/foo").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidJson(_)));
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn non_object_is_rejected() {
        assert_eq!(
            parse_manifest("null", "p").unwrap_err(),
            ManifestError::NotAnObject
        );
        assert_eq!(
            parse_manifest("[1,2]", "p").unwrap_err(),
            ManifestError::NotAnObject
        );
    }

    #[test]
    fn missing_name_mentions_name() {
        let err = parse_manifest(r#"{"description":"d","items":[]}"#, "p").unwrap_err();
        assert!(err.to_string().contains("\"name\""));
    }

    #[test]
    fn blank_description_mentions_description() {
        let err = parse_manifest(r#"{"name":"n","description":"  ","items":[]}"#, "p")
            .unwrap_err();
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn empty_items_parses() {
        let manifest =
            parse_manifest(r#"{"name":"n","description":"d","items":[]}"#, "plugins/foo").unwrap();
        assert!(manifest.items.is_empty());
        assert_eq!(manifest.id, "foo");
    }

    #[test]
    fn missing_items_mentions_items() {
        let err = parse_manifest(r#"{"name":"n","description":"d"}"#, "p").unwrap_err();
        assert_eq!(err, ManifestError::MissingItems);
        assert!(err.to_string().contains("\"items\""));
    }

    #[test]
    fn legacy_item_validation() {
        let cases = [
            (r#"["x"]"#, "must be an object"),
            (r#"[{"kind":"agent"}]"#, "\"path\""),
            (r#"[{"path":"a.md","kind":" "}]"#, "\"kind\""),
            (r#"[{"path":"a.md","kind":"theme"}]"#, "not one of"),
        ];
        for (items, expected) in cases {
            let raw = format!(r#"{{"name":"n","description":"d","items":{}}}"#, items);
            let err = parse_manifest(&raw, "p").unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "{} -> {}",
                items,
                err
            );
        }
    }

    #[test]
    fn legacy_items_keep_repo_paths() {
        let raw = r#"{
            "name": "Kit", "description": "d",
            "items": [
                {"path": "agents/a.agent.md", "kind": "agent"},
                {"path": "./prompts/p.prompt.md", "kind": "prompt"}
            ]
        }"#;
        let manifest = parse_manifest(raw, "plugins/kit").unwrap();
        assert_eq!(
            manifest.items,
            vec![
                PluginItem {
                    path: "agents/a.agent.md".to_string(),
                    kind: ItemKind::Agent
                },
                PluginItem {
                    path: "prompts/p.prompt.md".to_string(),
                    kind: ItemKind::Prompt
                },
            ]
        );
    }

    #[test]
    fn shorthand_skill_is_expanded() {
        let raw = r#"{"name":"n","description":"d","skills":["./skills/bar/"]}"#;
        let manifest = parse_manifest(raw, "plugins/foo").unwrap();
        assert_eq!(
            manifest.items,
            vec![PluginItem {
                path: "plugins/foo/skills/bar".to_string(),
                kind: ItemKind::Skill
            }]
        );
    }

    #[test]
    fn shorthand_agents_and_skills() {
        let raw = r#"{"name":"n","description":"d","agents":["./agents"],"skills":"./skills/x"}"#;
        let manifest = parse_manifest(raw, "/plugins/foo/").unwrap();
        assert_eq!(manifest.items.len(), 2);
        assert_eq!(manifest.items[0].path, "plugins/foo/agents");
        assert_eq!(manifest.items[0].kind, ItemKind::Agent);
        assert_eq!(manifest.items[1].path, "plugins/foo/skills/x");
    }

    #[test]
    fn shorthand_entries_must_be_strings() {
        let raw = r#"{"name":"n","description":"d","agents":["./a", 3]}"#;
        assert_eq!(
            parse_manifest(raw, "p").unwrap_err(),
            ManifestError::InvalidShorthand {
                field: "agents",
                index: 1
            }
        );
    }

    #[test]
    fn explicit_id_and_metadata() {
        let raw = r#"{
            "id": "custom", "name": "n", "description": "d", "version": "1.2.0",
            "author": {"name": "Jo"}, "license": "MIT", "featured": true,
            "tags": ["a", 1, "b"], "items": []
        }"#;
        let manifest = parse_manifest(raw, "plugins/foo").unwrap();
        assert_eq!(manifest.id, "custom");
        assert_eq!(manifest.version.as_deref(), Some("1.2.0"));
        assert_eq!(manifest.author.as_ref().and_then(Author::name), Some("Jo"));
        assert!(manifest.featured);
        assert_eq!(manifest.tags, vec!["a", "b"]);
    }

    #[test]
    fn non_string_id_falls_back_to_directory() {
        let raw = r#"{"id": 7, "name":"n","description":"d","items":[]}"#;
        assert_eq!(parse_manifest(raw, "plugins/foo").unwrap().id, "foo");
    }

    #[test]
    fn manifest_path_joins() {
        assert_eq!(
            manifest_path("plugins/foo/"),
            "plugins/foo/.github/plugin/plugin.json"
        );
        assert_eq!(manifest_path(""), ".github/plugin/plugin.json");
    }
}
