//! Declared inventory collection.
//!
//! Reads the persisted state snapshot, the raw configuration sources and the
//! reference documentation tree of an execution directory. The public
//! collectors never fail: every I/O or decode error is logged and degrades to
//! an empty (or partial) result. The `try_*` variants expose the errors.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AdvisorError, Result};

/// A resource known locally, identified by `(type, id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclaredResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

impl DeclaredResource {
    pub fn new(resource_type: &str, id: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }
}

/// Full attribute map of one state instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclaredAttributeSet {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Concatenated configuration sources, sorted by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawConfigurationText(String);

impl RawConfigurationText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RawConfigurationText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Only the fields the collectors need; everything else in the snapshot is ignored.
#[derive(Debug, Deserialize)]
struct StateSnapshot {
    #[serde(default)]
    resources: Vec<StateResource>,
}

#[derive(Debug, Deserialize)]
struct StateResource {
    #[serde(rename = "type", default)]
    resource_type: String,
    #[serde(default)]
    instances: Vec<StateInstance>,
}

#[derive(Debug, Deserialize)]
struct StateInstance {
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

fn read_snapshot(path: &Path) -> Result<StateSnapshot> {
    let raw = std::fs::read_to_string(path).map_err(|source| AdvisorError::StateUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| AdvisorError::StateMalformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Declared resources from the state snapshot, sorted and deduplicated.
///
/// Instances without a string `id` attribute are skipped.
pub fn try_collect_from_state(path: &Path) -> Result<Vec<DeclaredResource>> {
    let snapshot = read_snapshot(path)?;
    let unique: BTreeSet<DeclaredResource> = snapshot
        .resources
        .iter()
        .flat_map(|resource| {
            resource.instances.iter().filter_map(|instance| {
                instance
                    .attributes
                    .get("id")
                    .and_then(|id| id.as_str())
                    .map(|id| DeclaredResource::new(&resource.resource_type, id))
            })
        })
        .collect();
    Ok(unique.into_iter().collect())
}

pub fn collect_from_state(path: &Path) -> Vec<DeclaredResource> {
    match try_collect_from_state(path) {
        Ok(resources) => resources,
        Err(e) => {
            warn!(error = %e, "state snapshot ignored, using empty inventory");
            Vec::new()
        }
    }
}

pub fn try_collect_attributes_from_state(path: &Path) -> Result<Vec<DeclaredAttributeSet>> {
    let snapshot = read_snapshot(path)?;
    Ok(snapshot
        .resources
        .into_iter()
        .flat_map(|resource| {
            let resource_type = resource.resource_type;
            resource
                .instances
                .into_iter()
                .map(move |instance| DeclaredAttributeSet {
                    resource_type: resource_type.clone(),
                    attributes: instance.attributes,
                })
        })
        .collect())
}

pub fn collect_attributes_from_state(path: &Path) -> Vec<DeclaredAttributeSet> {
    match try_collect_attributes_from_state(path) {
        Ok(sets) => sets,
        Err(e) => {
            warn!(error = %e, "state attributes ignored");
            Vec::new()
        }
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(extension)
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

/// Concatenate every `*.{extension}` file directly under `dir`.
///
/// Files are read in name order and each is followed by a newline. An
/// unreadable file is reported through `on_skip` and omitted.
fn concat_configuration(
    dir: &Path,
    extension: &str,
    mut on_skip: impl FnMut(AdvisorError),
) -> Result<RawConfigurationText> {
    let entries = sorted_entries(dir).map_err(|source| AdvisorError::ConfigUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut text = String::new();
    for path in entries {
        if !path.is_file() || !has_extension(&path, extension) {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                text.push_str(&content);
                text.push('\n');
            }
            Err(source) => on_skip(AdvisorError::ConfigUnreadable { path, source }),
        }
    }
    Ok(RawConfigurationText(text))
}

/// Strict variant: the first unreadable file fails the whole collection.
pub fn try_collect_raw_configuration(dir: &Path, extension: &str) -> Result<RawConfigurationText> {
    let mut first_error = None;
    let text = concat_configuration(dir, extension, |e| {
        first_error.get_or_insert(e);
    })?;
    match first_error {
        Some(e) => Err(e),
        None => Ok(text),
    }
}

pub fn collect_raw_configuration(dir: &Path, extension: &str) -> RawConfigurationText {
    let collected = concat_configuration(dir, extension, |e| {
        warn!(error = %e, "configuration file skipped");
    });
    match collected {
        Ok(text) => {
            debug!(bytes = text.as_str().len(), "raw configuration collected");
            text
        }
        Err(e) => {
            warn!(error = %e, "configuration directory ignored");
            RawConfigurationText::default()
        }
    }
}

fn walk_docs(
    dir: &Path,
    out: &mut String,
    on_skip: &mut impl FnMut(AdvisorError),
) -> Result<()> {
    let entries = sorted_entries(dir).map_err(|source| AdvisorError::DocsUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;
    for path in entries {
        // Linked directories are never descended into.
        let file_type = match std::fs::symlink_metadata(&path) {
            Ok(metadata) => metadata.file_type(),
            Err(source) => {
                on_skip(AdvisorError::DocsUnreadable { path, source });
                continue;
            }
        };
        if file_type.is_dir() {
            if let Err(e) = walk_docs(&path, out, on_skip) {
                on_skip(e);
            }
        } else if file_type.is_symlink() && path.is_dir() {
            debug!(path = %path.display(), "symlinked documentation directory skipped");
        } else {
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    out.push_str(&content);
                    out.push('\n');
                }
                Err(source) => on_skip(AdvisorError::DocsUnreadable { path, source }),
            }
        }
    }
    Ok(())
}

/// Reference documentation under `root`, walked recursively in path order.
pub fn try_collect_reference_docs(root: &Path) -> Result<String> {
    let mut out = String::new();
    let mut first_error = None;
    walk_docs(root, &mut out, &mut |e| {
        first_error.get_or_insert(e);
    })?;
    match first_error {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

pub fn collect_reference_docs(root: &Path) -> String {
    let mut out = String::new();
    let walked = walk_docs(root, &mut out, &mut |e| {
        warn!(error = %e, "documentation file skipped");
    });
    if let Err(e) = walked {
        warn!(error = %e, "reference documentation unavailable");
    }
    out
}
