//! The project manifest (`package.json`).
//!
//! Only `dependencies` is interpreted. Every other key is kept as read, in
//! file order, so a load/save cycle never reshuffles a hand-edited file.

use anyhow::Context;
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

pub const MANIFEST_FILE: &str = "package.json";

const DEPENDENCIES_KEY: &str = "dependencies";
const INITIAL_VERSION: &str = "1.0.0";

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("{} not found; run `clockwork init` to create it", .0.display())]
    NotFound(PathBuf),

    #[error("invalid {}: {reason}", .path.display())]
    ParseError { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    document: Map<String, Value>,
    name: String,
    version: String,
    dependencies: IndexMap<String, String>,
}

/// The keys `package.json` must (or may) carry, as typed values.
#[derive(Deserialize)]
struct ManifestFields {
    name: String,
    version: String,
    #[serde(default)]
    dependencies: Option<IndexMap<String, String>>,
}

impl Manifest {
    /// A fresh manifest as written by `init`.
    pub fn new(name: &str) -> Self {
        let mut document = Map::new();
        document.insert("name".into(), Value::String(name.to_string()));
        document.insert("version".into(), Value::String(INITIAL_VERSION.to_string()));
        document.insert("description".into(), Value::String(String::new()));
        Self {
            document,
            name: name.to_string(),
            version: INITIAL_VERSION.to_string(),
            dependencies: IndexMap::new(),
        }
    }

    /// Returns: `<project_dir>/package.json`
    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(MANIFEST_FILE)
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, project_dir: &Path) -> Result<Self, ManifestError> {
        let path = Self::path(project_dir);
        if !runtime.exists(&path) {
            return Err(ManifestError::NotFound(path));
        }

        let content = runtime
            .read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        Self::parse(&content).map_err(|reason| ManifestError::ParseError { path, reason })
    }

    /// Parse manifest text. The error is a human readable reason.
    pub fn parse(content: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let Value::Object(document) = value else {
            return Err("top level value must be a JSON object".to_string());
        };

        let fields: ManifestFields =
            serde_json::from_value(Value::Object(document.clone())).map_err(|e| e.to_string())?;

        Ok(Self {
            document,
            name: fields.name,
            version: fields.version,
            dependencies: fields.dependencies.unwrap_or_default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Declared packages in file order: name -> `location@tag`.
    pub fn dependencies(&self) -> &IndexMap<String, String> {
        &self.dependencies
    }

    pub fn dependency(&self, name: &str) -> Option<&str> {
        self.dependencies.get(name).map(String::as_str)
    }

    /// Last write wins. A known name keeps its position.
    pub fn set_dependency(&mut self, name: &str, spec: &str) {
        self.dependencies.insert(name.to_string(), spec.to_string());
    }

    /// Serialized form: 2-space indented JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut document = self.document.clone();
        if !self.dependencies.is_empty() || document.contains_key(DEPENDENCIES_KEY) {
            let entries: Map<String, Value> = self
                .dependencies
                .iter()
                .map(|(name, spec)| (name.clone(), Value::String(spec.clone())))
                .collect();
            document.insert(DEPENDENCIES_KEY.to_string(), Value::Object(entries));
        }

        let mut content = serde_json::to_string_pretty(&document)?;
        content.push('\n');
        Ok(content)
    }

    /// Write the whole manifest. The content goes to `package.json.tmp`
    /// first and is renamed over `package.json`.
    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&self, runtime: &R, project_dir: &Path) -> Result<(), ManifestError> {
        let path = Self::path(project_dir);
        let staged = project_dir.join(format!("{}.tmp", MANIFEST_FILE));
        let content = self.to_json().context("Failed to serialize manifest")?;

        debug!("Writing {} dependencies to {:?}", self.dependencies.len(), path);
        if let Err(e) = runtime.write(&staged, content.as_bytes()) {
            let _ = runtime.remove_file(&staged);
            return Err(ManifestError::Io(
                e.context(format!("Failed to write {:?}", staged)),
            ));
        }
        if let Err(e) = runtime.rename(&staged, &path) {
            let _ = runtime.remove_file(&staged);
            return Err(ManifestError::Io(
                e.context(format!("Failed to replace {:?}", path)),
            ));
        }
        Ok(())
    }
}
