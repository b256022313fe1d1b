//! # Inventory Sink
//!
//! The materializer never owns hosts or groups. It writes them through the
//! [`InventorySink`] trait, so callers can plug in whatever store they use.
//! [`Inventory`] is the in-memory implementation used by the CLI and tests.
//!
//! ## Rendered Shape
//! ```text
//! {
//!   "_meta": { "hostvars": { "10.0.0.5": { "ansible_host": ..., ... } } },
//!   "all":   { "hosts": [...], "children": [...], "vars": { ... } },
//!   "web":   { "hosts": ["10.0.0.5"], "children": [], "vars": {} }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value};

use crate::ALL_GROUP;

// =============================================================================
// Sink Trait
// =============================================================================

/// Destination for materialized hosts, groups and variables.
///
/// Implementations must create the `all` group up front and treat
/// `add_group` as idempotent.
pub trait InventorySink {
    /// Registers a host. Adding an existing host is a no-op.
    fn add_host(&mut self, host: &str);

    /// Sets (or overwrites) a single host variable.
    fn set_host_variable(&mut self, host: &str, name: &str, value: Value);

    /// Returns the variables currently attached to `host`.
    fn host_variables(&self, host: &str) -> Map<String, Value>;

    /// Creates a group if absent.
    fn add_group(&mut self, group: &str);

    /// Adds a host to a group, creating the group if needed.
    fn add_host_to_group(&mut self, group: &str, host: &str);

    /// Nests `child` under `parent`, creating both if needed.
    fn add_child_group(&mut self, parent: &str, child: &str);

    /// Sets a group variable.
    fn set_group_variable(&mut self, group: &str, name: &str, value: Value);
}

// =============================================================================
// In-Memory Inventory
// =============================================================================

/// A group and what it holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub hosts: BTreeSet<String>,
    pub children: BTreeSet<String>,
    pub vars: Map<String, Value>,
}

/// In-memory [`InventorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
    hosts: BTreeMap<String, Map<String, Value>>,
    groups: BTreeMap<String, Group>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    /// Creates an empty inventory holding only the `all` group.
    pub fn new() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(ALL_GROUP.to_string(), Group::default());
        Inventory {
            hosts: BTreeMap::new(),
            groups,
        }
    }

    /// Variables of one host, if it exists.
    pub fn host(&self, host: &str) -> Option<&Map<String, Value>> {
        self.hosts.get(host)
    }

    /// One group, if it exists.
    pub fn group(&self, group: &str) -> Option<&Group> {
        self.groups.get(group)
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Renders the Ansible dynamic inventory `--list` document.
    ///
    /// Every host lands directly in `all`; every other top-level group is
    /// listed as a child of `all` unless another group already nests it.
    /// Groups nested explicitly under `all` count as top-level.
    pub fn to_ansible_json(&self) -> Value {
        let nested: BTreeSet<&String> = self
            .groups
            .iter()
            .filter(|(name, _)| name.as_str() != ALL_GROUP)
            .flat_map(|(_, g)| g.children.iter())
            .collect();

        let mut document = Map::new();
        for (name, group) in &self.groups {
            let (hosts, children): (Vec<&String>, Vec<&String>) = if name == ALL_GROUP {
                (
                    self.hosts.keys().collect(),
                    self.groups
                        .keys()
                        .filter(|g| g.as_str() != ALL_GROUP && !nested.contains(g))
                        .collect(),
                )
            } else {
                (group.hosts.iter().collect(), group.children.iter().collect())
            };

            document.insert(
                name.clone(),
                json!({
                    "hosts": hosts,
                    "children": children,
                    "vars": group.vars,
                }),
            );
        }

        document.insert(
            "_meta".to_string(),
            json!({ "hostvars": self.hosts }),
        );

        Value::Object(document)
    }

    fn group_mut(&mut self, group: &str) -> &mut Group {
        self.groups.entry(group.to_string()).or_default()
    }
}

impl InventorySink for Inventory {
    fn add_host(&mut self, host: &str) {
        self.hosts.entry(host.to_string()).or_default();
    }

    fn set_host_variable(&mut self, host: &str, name: &str, value: Value) {
        self.hosts
            .entry(host.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    fn host_variables(&self, host: &str) -> Map<String, Value> {
        self.hosts.get(host).cloned().unwrap_or_default()
    }

    fn add_group(&mut self, group: &str) {
        self.group_mut(group);
    }

    fn add_host_to_group(&mut self, group: &str, host: &str) {
        self.add_host(host);
        self.group_mut(group).hosts.insert(host.to_string());
    }

    fn add_child_group(&mut self, parent: &str, child: &str) {
        self.group_mut(child);
        self.group_mut(parent).children.insert(child.to_string());
    }

    fn set_group_variable(&mut self, group: &str, name: &str, value: Value) {
        self.group_mut(group).vars.insert(name.to_string(), value);
    }
}
