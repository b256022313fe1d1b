//! # Composition Rules
//!
//! Declarative rules that turn server records into variables and groups:
//! `compose`, `groups` and `keyed_groups`.
//!
//! ## Keyed Group Naming
//! ```text
//! key value            prefix  sep   group name(s)
//! ───────────────────  ──────  ───   ──────────────────────
//! "web"                ""      "_"   web        (leading_separator = false)
//! "web"                ""      "_"   _web       (leading_separator = true)
//! "web"                "role"  "_"   role_web
//! ["a", "b"]           "tag"   "_"   tag_a, tag_b
//! {"env": "prod"}      ""      "_"   env_prod
//! {"env": ""}          ""      "_"   env_       (trailing_separator = true)
//! {"env": ""}          ""      "_"   env        (trailing_separator = false)
//! ""                   "os"    "_"   os_unknown (default_value = "unknown")
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Compose Rules
// =============================================================================

/// Everything the materializer needs to know besides the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeRules {
    /// Variable name → expression.
    #[serde(default)]
    pub compose: BTreeMap<String, String>,

    /// Group name → boolean expression.
    #[serde(default)]
    pub groups: BTreeMap<String, String>,

    #[serde(default)]
    pub keyed_groups: Vec<KeyedGroup>,

    /// Put `separator` in front of keyed group names even without a prefix.
    #[serde(default)]
    pub leading_separator: bool,

    /// Abort on the first failing expression instead of skipping it.
    #[serde(default)]
    pub strict: bool,

    /// Rewrite group names to `[A-Za-z0-9_]`.
    ///
    /// On by default. Ansible's own `force_valid_group_names` defaults to
    /// `never`; set this to `false` to keep names exactly as produced.
    #[serde(default = "default_sanitize_group_names")]
    pub sanitize_group_names: bool,
}

fn default_sanitize_group_names() -> bool {
    true
}

impl Default for ComposeRules {
    fn default() -> Self {
        ComposeRules {
            compose: BTreeMap::new(),
            groups: BTreeMap::new(),
            keyed_groups: Vec::new(),
            leading_separator: false,
            strict: false,
            sanitize_group_names: default_sanitize_group_names(),
        }
    }
}

impl ComposeRules {
    /// Validates every keyed group spec.
    pub fn validate(&self) -> Result<(), String> {
        self.keyed_groups.iter().try_for_each(KeyedGroup::validate)
    }

    /// The name a group is created under.
    pub fn group_name(&self, raw: &str) -> String {
        if self.sanitize_group_names {
            sanitize_group_name(raw)
        } else {
            raw.to_string()
        }
    }
}

// =============================================================================
// Keyed Group
// =============================================================================

/// One `keyed_groups` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedGroup {
    /// Expression whose value names the group(s).
    pub key: String,

    #[serde(default)]
    pub prefix: String,

    #[serde(default = "default_separator")]
    pub separator: String,

    /// Group name used when the key evaluates to an empty string.
    #[serde(default)]
    pub default_value: Option<String>,

    /// For mapping values: whether an empty value keeps the separator.
    #[serde(default)]
    pub trailing_separator: Option<bool>,

    /// Every generated group becomes a child of this group.
    #[serde(default)]
    pub parent_group: Option<String>,
}

fn default_separator() -> String {
    "_".to_string()
}

impl KeyedGroup {
    pub fn new(key: impl Into<String>) -> Self {
        KeyedGroup {
            key: key.into(),
            prefix: String::new(),
            separator: default_separator(),
            default_value: None,
            trailing_separator: None,
            parent_group: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.key.trim().is_empty() {
            return Err("keyed_groups entry has an empty key".to_string());
        }
        if self.default_value.is_some() && self.trailing_separator.is_some() {
            return Err(format!(
                "keyed_groups entry '{}': default_value and trailing_separator are mutually exclusive",
                self.key
            ));
        }
        Ok(())
    }

    /// Derives group names from an evaluated key.
    ///
    /// Names come back unsanitized; see [`ComposeRules::group_name`].
    pub fn group_names(&self, value: &Value, leading_separator: bool) -> KeyedNames {
        let empty_with_default =
            matches!(value, Value::String(s) if s.is_empty()) && self.default_value.is_some();
        if !empty_with_default && is_blank(value) {
            return KeyedNames::Empty;
        }

        let mut bare = Vec::new();
        match value {
            Value::String(s) => bare.push(self.or_default(s)),
            Value::Number(_) | Value::Bool(_) => bare.push(scalar_text(value)),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(s) => bare.push(self.or_default(s)),
                        Value::Number(_) | Value::Bool(_) => bare.push(scalar_text(item)),
                        other => return KeyedNames::Invalid(type_name(other)),
                    }
                }
            }
            Value::Object(map) => {
                for (name, inner) in map {
                    let text = match inner {
                        Value::Null => String::new(),
                        Value::String(_) | Value::Number(_) | Value::Bool(_) => scalar_text(inner),
                        other => return KeyedNames::Invalid(type_name(other)),
                    };
                    let entry = if !text.is_empty() {
                        format!("{}{}{}", name, self.separator, text)
                    } else if let Some(default) = &self.default_value {
                        format!("{}{}{}", name, self.separator, default)
                    } else if self.trailing_separator == Some(false) {
                        name.clone()
                    } else {
                        format!("{}{}", name, self.separator)
                    };
                    bare.push(entry);
                }
            }
            Value::Null => return KeyedNames::Empty,
        }

        let separator = if self.prefix.is_empty() && !leading_separator {
            ""
        } else {
            self.separator.as_str()
        };

        KeyedNames::Groups(
            bare.into_iter()
                .map(|name| format!("{}{}{}", self.prefix, separator, name))
                .collect(),
        )
    }

    fn or_default(&self, text: &str) -> String {
        match (&self.default_value, text.is_empty()) {
            (Some(default), true) => default.clone(),
            _ => text.to_string(),
        }
    }
}

/// Result of naming groups from a keyed group value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyedNames {
    Groups(Vec<String>),
    /// The key produced nothing usable (null, false, empty).
    Empty,
    /// The key produced a value of this type, which cannot name a group.
    Invalid(&'static str),
}

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_group_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(spec: &KeyedGroup, value: Value) -> Vec<String> {
        match spec.group_names(&value, false) {
            KeyedNames::Groups(names) => names,
            other => panic!("expected groups, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_value_without_prefix() {
        assert_eq!(names(&KeyedGroup::new("description"), json!("web")), vec!["web"]);
    }

    #[test]
    fn test_leading_separator() {
        let spec = KeyedGroup::new("description");
        assert_eq!(
            spec.group_names(&json!("web"), true),
            KeyedNames::Groups(vec!["_web".to_string()])
        );
    }

    #[test]
    fn test_prefix_and_separator() {
        let mut spec = KeyedGroup::new("tags");
        spec.prefix = "tag".to_string();
        spec.separator = "-".to_string();
        assert_eq!(names(&spec, json!(["a", "b"])), vec!["tag-a", "tag-b"]);
    }

    #[test]
    fn test_mapping_values() {
        let spec = KeyedGroup::new("labels");
        assert_eq!(
            names(&spec, json!({"env": "prod", "tier": ""})),
            vec!["env_prod", "tier_"]
        );

        let mut spec = KeyedGroup::new("labels");
        spec.trailing_separator = Some(false);
        assert_eq!(names(&spec, json!({"tier": ""})), vec!["tier"]);

        let mut spec = KeyedGroup::new("labels");
        spec.default_value = Some("none".to_string());
        assert_eq!(names(&spec, json!({"tier": ""})), vec!["tier_none"]);
    }

    #[test]
    fn test_default_value_for_empty_string() {
        let mut spec = KeyedGroup::new("description");
        spec.prefix = "desc".to_string();
        spec.default_value = Some("unknown".to_string());
        assert_eq!(names(&spec, json!("")), vec!["desc_unknown"]);
    }

    #[test]
    fn test_empty_and_invalid_values() {
        let spec = KeyedGroup::new("description");
        assert_eq!(spec.group_names(&json!(""), false), KeyedNames::Empty);
        assert_eq!(spec.group_names(&json!(null), false), KeyedNames::Empty);
        assert_eq!(
            spec.group_names(&json!([{"nested": 1}]), false),
            KeyedNames::Invalid("mapping")
        );
    }

    #[test]
    fn test_numbers_are_stringified() {
        let mut spec = KeyedGroup::new("operating_system");
        spec.prefix = "os".to_string();
        assert_eq!(names(&spec, json!(3)), vec!["os_3"]);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_group_name("web-01.example"), "web_01_example");
        assert_eq!(sanitize_group_name("ok_name"), "ok_name");
    }

    #[test]
    fn test_group_name_follows_sanitize_switch() {
        let mut rules = ComposeRules::default();
        assert!(rules.sanitize_group_names);
        assert_eq!(rules.group_name("tag-a"), "tag_a");

        rules.sanitize_group_names = false;
        assert_eq!(rules.group_name("tag-a"), "tag-a");
    }

    #[test]
    fn test_validate() {
        let mut spec = KeyedGroup::new("x");
        assert!(spec.validate().is_ok());

        spec.default_value = Some("d".to_string());
        spec.trailing_separator = Some(false);
        assert!(spec.validate().is_err());

        assert!(KeyedGroup::new("  ").validate().is_err());
    }

    #[test]
    fn test_rules_deserialize_with_defaults() {
        let rules: ComposeRules = serde_json::from_value(json!({
            "compose": {"env": "'prod'"},
            "keyed_groups": [{"key": "description"}]
        }))
        .unwrap();

        assert!(!rules.strict);
        assert!(rules.sanitize_group_names);
        assert!(rules.groups.is_empty());
        assert_eq!(rules.keyed_groups[0].separator, "_");
    }
}
