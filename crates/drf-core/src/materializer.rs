//! # Inventory Materializer
//!
//! Turns fetched servers into hosts, variables and group memberships.
//!
//! ## Per-Server Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        materialize_server()                             │
//! │                                                                         │
//! │  Server ──► 1. host = server.ip (create / overwrite)                    │
//! │                                                                         │
//! │         ──► 2. core vars: ansible_host, hostname, server,               │
//! │                operating_system (join on id, must match)                │
//! │                                                                         │
//! │         ──► 3. compose:      name → evaluate(expr)        ┐             │
//! │         ──► 4. groups:       name → condition(expr)       ├ strict:     │
//! │         ──► 5. keyed_groups: key  → evaluate → names      ┘ abort       │
//! │                                                            lenient:     │
//! │                                                            skip rule    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expressions see the server record merged with the host's variables. The
//! merged context is only built when the rule set in question is non-empty.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{CoreError, CoreResult, ExpressionError};
use crate::expression::{combine_context, Evaluator};
use crate::inventory::InventorySink;
use crate::rules::{ComposeRules, KeyedNames};
use crate::types::{OperatingSystem, Server};

// =============================================================================
// Report
// =============================================================================

/// Which kind of rule a skipped expression belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Compose,
    Group,
    KeyedGroup,
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleKind::Compose => write!(f, "compose"),
            RuleKind::Group => write!(f, "groups"),
            RuleKind::KeyedGroup => write!(f, "keyed_groups"),
        }
    }
}

/// An expression that failed under non-strict mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    pub host: String,
    pub kind: RuleKind,
    /// Variable name, group name or keyed group key.
    pub name: String,
    pub message: String,
}

/// Two servers shared an IP; the later one won.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverwrittenHost {
    pub ip: String,
    pub previous_server: i64,
    pub server: i64,
}

/// Summary of one materialization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Servers processed (hosts created or overwritten).
    pub servers: usize,
    pub skipped: Vec<SkippedRule>,
    pub overwritten: Vec<OverwrittenHost>,
}

// =============================================================================
// Materializer
// =============================================================================

/// Applies [`ComposeRules`] to server records through an [`Evaluator`].
pub struct Materializer<'a, E: Evaluator + ?Sized> {
    rules: &'a ComposeRules,
    evaluator: &'a E,
}

impl<'a, E: Evaluator + ?Sized> Materializer<'a, E> {
    pub fn new(rules: &'a ComposeRules, evaluator: &'a E) -> Self {
        Materializer { rules, evaluator }
    }

    /// Materializes every server in order.
    ///
    /// Stops at the first error; hosts written before it stay in the sink.
    pub fn materialize<S: InventorySink + ?Sized>(
        &self,
        servers: &[Server],
        operating_systems: &[OperatingSystem],
        sink: &mut S,
    ) -> CoreResult<MaterializeReport> {
        let mut report = MaterializeReport::default();
        let mut seen: HashMap<&str, i64> = HashMap::with_capacity(servers.len());

        for server in servers {
            if let Some(previous) = seen.insert(server.ip.as_str(), server.id) {
                report.overwritten.push(OverwrittenHost {
                    ip: server.ip.clone(),
                    previous_server: previous,
                    server: server.id,
                });
            }
            self.materialize_server(server, operating_systems, sink, &mut report)?;
            report.servers += 1;
        }

        Ok(report)
    }

    /// Runs the whole pipeline for a single server.
    pub fn materialize_server<S: InventorySink + ?Sized>(
        &self,
        server: &Server,
        operating_systems: &[OperatingSystem],
        sink: &mut S,
        report: &mut MaterializeReport,
    ) -> CoreResult<()> {
        let host = server.ip.as_str();
        let operating_system = server
            .resolve_operating_system(operating_systems)
            .ok_or(CoreError::OperatingSystemNotFound {
                server_id: server.id,
                operating_system: server.operating_system,
            })?;

        sink.add_host(host);
        fill_host_variables(server, operating_system, sink)?;

        let record = serde_json::to_value(server)?;
        self.set_composite_vars(&record, host, sink, report)?;
        self.add_to_composed_groups(&record, host, sink, report)?;
        self.add_to_keyed_groups(&record, host, sink, report)?;

        Ok(())
    }

    fn set_composite_vars<S: InventorySink + ?Sized>(
        &self,
        record: &Value,
        host: &str,
        sink: &mut S,
        report: &mut MaterializeReport,
    ) -> CoreResult<()> {
        if self.rules.compose.is_empty() {
            return Ok(());
        }
        let context = combine_context(record, &sink.host_variables(host));

        for (variable, expression) in &self.rules.compose {
            match self.evaluator.evaluate(expression, &context) {
                Ok(value) => sink.set_host_variable(host, variable, value),
                Err(e) => self.skip_or_fail(report, host, RuleKind::Compose, variable, e, |message| {
                    CoreError::ComposeFailed {
                        variable: variable.clone(),
                        host: host.to_string(),
                        message,
                    }
                })?,
            }
        }
        Ok(())
    }

    fn add_to_composed_groups<S: InventorySink + ?Sized>(
        &self,
        record: &Value,
        host: &str,
        sink: &mut S,
        report: &mut MaterializeReport,
    ) -> CoreResult<()> {
        if self.rules.groups.is_empty() {
            return Ok(());
        }
        let context = combine_context(record, &sink.host_variables(host));

        for (group, condition) in &self.rules.groups {
            match self.evaluator.evaluate_condition(condition, &context) {
                Ok(true) => {
                    let name = self.rules.group_name(group);
                    sink.add_group(&name);
                    sink.add_host_to_group(&name, host);
                }
                Ok(false) => {}
                Err(e) => self.skip_or_fail(report, host, RuleKind::Group, group, e, |message| {
                    CoreError::GroupFailed {
                        group: group.clone(),
                        host: host.to_string(),
                        message,
                    }
                })?,
            }
        }
        Ok(())
    }

    fn add_to_keyed_groups<S: InventorySink + ?Sized>(
        &self,
        record: &Value,
        host: &str,
        sink: &mut S,
        report: &mut MaterializeReport,
    ) -> CoreResult<()> {
        if self.rules.keyed_groups.is_empty() {
            return Ok(());
        }
        let context = combine_context(record, &sink.host_variables(host));

        for keyed in &self.rules.keyed_groups {
            let keyed_failure = |message: String| CoreError::KeyedGroupFailed {
                key: keyed.key.clone(),
                host: host.to_string(),
                message,
            };

            let value = match self.evaluator.evaluate(&keyed.key, &context) {
                Ok(value) => value,
                Err(e) => {
                    self.skip_or_fail(report, host, RuleKind::KeyedGroup, &keyed.key, e, keyed_failure)?;
                    continue;
                }
            };

            match keyed.group_names(&value, self.rules.leading_separator) {
                KeyedNames::Groups(names) => {
                    let parent = keyed.parent_group.as_deref().map(|p| self.rules.group_name(p));
                    if let Some(parent) = &parent {
                        sink.add_group(parent);
                    }
                    for name in names {
                        let name = self.rules.group_name(&name);
                        sink.add_group(&name);
                        sink.add_host_to_group(&name, host);
                        if let Some(parent) = &parent {
                            sink.add_child_group(parent, &name);
                        }
                    }
                }
                KeyedNames::Empty => {
                    let e = ExpressionError::new("No key or key resulted empty, invalid entry");
                    self.skip_or_fail(report, host, RuleKind::KeyedGroup, &keyed.key, e, keyed_failure)?;
                }
                KeyedNames::Invalid(found) => {
                    return Err(CoreError::InvalidGroupName {
                        key: keyed.key.clone(),
                        host: host.to_string(),
                        found: found.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Strict: turn the evaluator message into the caller's error.
    /// Lenient: record the skip and carry on.
    fn skip_or_fail(
        &self,
        report: &mut MaterializeReport,
        host: &str,
        kind: RuleKind,
        name: &str,
        error: ExpressionError,
        failure: impl FnOnce(String) -> CoreError,
    ) -> CoreResult<()> {
        if self.rules.strict {
            return Err(failure(error.message));
        }
        report.skipped.push(SkippedRule {
            host: host.to_string(),
            kind,
            name: name.to_string(),
            message: error.message,
        });
        Ok(())
    }
}

/// Sets `ansible_host`, `hostname`, `server` and `operating_system`.
fn fill_host_variables<S: InventorySink + ?Sized>(
    server: &Server,
    operating_system: &OperatingSystem,
    sink: &mut S,
) -> CoreResult<()> {
    let host = server.ip.as_str();
    sink.set_host_variable(host, "ansible_host", Value::String(server.ip.clone()));
    sink.set_host_variable(host, "hostname", Value::String(server.hostname.clone()));
    sink.set_host_variable(host, "server", serde_json::to_value(server.summary())?);
    sink.set_host_variable(host, "operating_system", serde_json::to_value(operating_system)?);
    Ok(())
}
