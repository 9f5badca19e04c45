//! Solve request assembly.
//!
//! Translates a [`BuildOptions`] into the backend's flat attribute
//! representation: frontend attributes describing build semantics, local
//! directory bindings naming the context and dockerfile directories, and an
//! optional image export descriptor built from the normalized output tags.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DOCKERFILE_NAME, DOCKERFILE_FRONTEND};
use crate::progress::ProgressMode;
use crate::reference;

/// One build invocation's worth of user-supplied options.
///
/// Sequence options (`build_args`, `labels`, `add_hosts`, `tags`) are passed
/// through in order and without deduplication; the backend owns any
/// last-wins semantics.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub context: String,
    pub file: Option<String>,
    pub target: Option<String>,
    pub build_args: Vec<String>,
    pub labels: Vec<String>,
    pub add_hosts: Vec<String>,
    pub tags: Vec<String>,
    pub pull: bool,
    pub progress: ProgressMode,
}

/// The assembled request sent to the backend's solve operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRequest {
    pub frontend: String,
    pub frontend_attrs: BTreeMap<String, String>,
    pub local_dirs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<ExportEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session: Vec<SessionAttachable>,
}

/// Output artifact specification; absent when the build publishes nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEntry {
    pub kind: ExportKind,
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Image,
}

/// Capabilities attached to the solve session, resolved backend-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAttachable {
    RegistryAuth,
}

impl SolveRequest {
    /// Assembles the complete request. Tag normalization failures are warned
    /// and dropped here; they never fail the build.
    pub fn from_options(opts: &BuildOptions) -> Self {
        Self {
            frontend: DOCKERFILE_FRONTEND.to_string(),
            frontend_attrs: frontend_attrs(opts),
            local_dirs: local_dirs(opts),
            exports: export_entries(&opts.tags).into_iter().collect(),
            session: vec![SessionAttachable::RegistryAuth],
        }
    }
}

/// Splits a `key=value` pair on the first `=` only. A pair without `=` maps
/// to an empty value rather than an error; cosmetic argument typos must not
/// abort a build.
fn split_pair(pair: &str) -> (&str, &str) {
    match pair.split_once('=') {
        Some((k, v)) => (k, v),
        None => (pair, ""),
    }
}

/// Maps build options to the frontend attribute table.
pub fn frontend_attrs(opts: &BuildOptions) -> BTreeMap<String, String> {
    // --target: always present; empty means the final stage.
    let mut m = BTreeMap::new();
    m.insert(
        "target".to_string(),
        opts.target.clone().unwrap_or_default(),
    );
    // --build-arg
    for pair in &opts.build_args {
        let (k, v) = split_pair(pair);
        m.insert(format!("build-arg:{}", k), v.to_string());
    }
    // --label
    for pair in &opts.labels {
        let (k, v) = split_pair(pair);
        m.insert(format!("label:{}", k), v.to_string());
    }
    // --add-host: omitted entirely when empty, never an empty string.
    if !opts.add_hosts.is_empty() {
        m.insert("add-hosts".to_string(), opts.add_hosts.join(","));
    }
    // --file
    let filename = match opts.file.as_deref() {
        Some(path) => base_name(path),
        None => DEFAULT_DOCKERFILE_NAME.to_string(),
    };
    m.insert("filename".to_string(), filename);
    // --pull
    if opts.pull {
        m.insert("image-resolve-mode".to_string(), "pull".to_string());
    }
    m
}

/// Maps build options to the two local directory bindings the backend mounts.
pub fn local_dirs(opts: &BuildOptions) -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert("context".to_string(), opts.context.clone());
    let dockerfile = match opts.file.as_deref() {
        Some(path) => dir_name(path),
        None => opts.context.clone(),
    };
    m.insert("dockerfile".to_string(), dockerfile);
    m
}

/// Builds the image export descriptor from the output tags, or `None` when no
/// tag survives normalization. Invalid tags are warned and dropped; a build
/// with zero valid tags degrades to build-only.
pub fn export_entries(tags: &[String]) -> Option<ExportEntry> {
    if tags.is_empty() {
        return None;
    }
    let mut normalized = Vec::with_capacity(tags.len());
    for tag in tags {
        match reference::normalize(tag) {
            Ok(r) => normalized.push(r.to_string()),
            Err(err) => {
                tracing::warn!(tag = %tag, error = %err, "failed to normalize tag, dropping it");
            }
        }
    }
    if normalized.is_empty() {
        return None;
    }
    let mut attrs = BTreeMap::new();
    attrs.insert("name".to_string(), normalized.join(","));
    // Empty value tells the backend not to also emit a digest-qualified name.
    attrs.insert("name-canonical".to_string(), String::new());
    Some(ExportEntry {
        kind: ExportKind::Image,
        attrs,
    })
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_DOCKERFILE_NAME.to_string())
}

fn dir_name(path: &str) -> String {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.to_string_lossy().into_owned()
        }
        _ => ".".to_string(),
    }
}
