//! Local vs remote inventory reconciliation.
//!
//! Remediation is additive only: resources present remotely but missing
//! locally become declaration blocks plus import commands. The reverse
//! direction is informational and never produces an action.

use std::collections::{BTreeSet, HashSet};

use advisor_agent::RemoteResource;
use serde::Serialize;

use crate::inventory::DeclaredResource;

pub const ADD_HEADER: &str = "add these resources to your configuration:";
pub const IMPORT_HEADER: &str = "run these import commands:";
pub const LOCAL_ONLY_HEADER: &str = "declared locally but not found remotely:";

/// Which side of the difference is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffDirection {
    /// Remote resources absent locally.
    #[default]
    RemoteOnly,
    /// Also list local resources absent remotely.
    Both,
}

impl DiffDirection {
    /// Scope instruction given to the agent for this direction.
    pub fn prompt_scope(&self) -> String {
        match self {
            DiffDirection::RemoteOnly => "Report only resources that exist remotely but are \
                 missing from the local inventory. Do not report resources that exist only \
                 locally."
                .to_string(),
            DiffDirection::Both => format!(
                "Report resources that exist remotely but are missing from the local \
                 inventory. Then add a final section headed `{LOCAL_ONLY_HEADER}` listing \
                 each local-only resource as `- <type> <id>`. Never suggest deleting or \
                 importing local-only resources."
            ),
        }
    }
}

/// Who computes the diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffMode {
    /// The reasoning agent pages the remote listing through its tool.
    #[default]
    Agent,
    /// The engine pages the listing and renders the result itself.
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportAction {
    pub resource_type: String,
    pub label: String,
    pub id: String,
    pub name: String,
}

impl ImportAction {
    fn declaration(&self) -> String {
        format!(
            "resource \"{}\" \"{}\" {{\n  name = \"{}\"\n}}\n",
            self.resource_type,
            self.label,
            escape_hcl_string(&self.name)
        )
    }

    fn import_command(&self) -> String {
        format!(
            "terraform import {}.{} {}\n",
            self.resource_type, self.label, self.id
        )
    }
}

/// Set difference between the declared and the remote inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventoryDiff {
    pub to_import: Vec<ImportAction>,
    pub local_only: Vec<DeclaredResource>,
}

impl InventoryDiff {
    pub fn compute(
        local: &[DeclaredResource],
        remote: &[RemoteResource],
        direction: DiffDirection,
    ) -> Self {
        let local_keys: HashSet<(&str, &str)> = local
            .iter()
            .map(|r| (r.resource_type.as_str(), r.id.as_str()))
            .collect();

        let mut remote_sorted: Vec<&RemoteResource> = remote.iter().collect();
        remote_sorted.sort();
        remote_sorted.dedup_by(|a, b| a.resource_type == b.resource_type && a.id == b.id);

        let mut labels: HashSet<(String, String)> = HashSet::new();
        let to_import = remote_sorted
            .iter()
            .filter(|r| !local_keys.contains(&(r.resource_type.as_str(), r.id.as_str())))
            .map(|r| {
                let label = unique_label(
                    &mut labels,
                    &r.resource_type,
                    resource_label(&r.resource_type, &r.id, &r.name),
                    &r.id,
                );
                ImportAction {
                    resource_type: r.resource_type.clone(),
                    label,
                    id: r.id.clone(),
                    name: r.name.clone(),
                }
            })
            .collect();

        let local_only = match direction {
            DiffDirection::RemoteOnly => Vec::new(),
            DiffDirection::Both => {
                let remote_keys: HashSet<(&str, &str)> = remote
                    .iter()
                    .map(|r| (r.resource_type.as_str(), r.id.as_str()))
                    .collect();
                local
                    .iter()
                    .filter(|r| !remote_keys.contains(&(r.resource_type.as_str(), r.id.as_str())))
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            }
        };

        Self {
            to_import,
            local_only,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_import.is_empty() && self.local_only.is_empty()
    }

    /// Render in the remediation format. No differences render as `""`.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();

        if !self.to_import.is_empty() {
            let blocks: Vec<String> = self.to_import.iter().map(ImportAction::declaration).collect();
            sections.push(format!("{ADD_HEADER}\n{}", blocks.join("\n")));

            let commands: String = self
                .to_import
                .iter()
                .map(ImportAction::import_command)
                .collect();
            sections.push(format!("{IMPORT_HEADER}\n{commands}"));
        }

        if !self.local_only.is_empty() {
            let lines: String = self
                .local_only
                .iter()
                .map(|r| format!("- {} {}\n", r.resource_type, r.id))
                .collect();
            sections.push(format!("{LOCAL_ONLY_HEADER}\n{lines}"));
        }

        sections.join("\n")
    }
}

fn sanitize_label(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Claim a label unused within `resource_type`: the base label, then
/// `<base>_<id>`, then `<base>_<id>_<n>` for n = 2, 3, ...
fn unique_label(
    taken: &mut HashSet<(String, String)>,
    resource_type: &str,
    base: String,
    id: &str,
) -> String {
    let id_suffixed = format!("{base}_{}", sanitize_label(id));
    let mut candidate = base;
    let mut attempt = 1u32;
    while taken.contains(&(resource_type.to_string(), candidate.clone())) {
        candidate = if attempt == 1 {
            id_suffixed.clone()
        } else {
            format!("{id_suffixed}_{attempt}")
        };
        attempt += 1;
    }
    taken.insert((resource_type.to_string(), candidate.clone()));
    candidate
}

/// Terraform block label for a remote resource.
///
/// Falls back to `<type>_<id>` when the name is empty or starts with a digit.
pub fn resource_label(resource_type: &str, id: &str, name: &str) -> String {
    let starts_with_digit = name.chars().next().is_some_and(|c| c.is_ascii_digit());
    if name.is_empty() || starts_with_digit {
        sanitize_label(&format!("{resource_type}_{id}"))
    } else {
        sanitize_label(name)
    }
}

fn escape_hcl_string(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
