//! Remote tidal-dl-ng configuration store.
//!
//! Reads, patches, and writes the remote settings document over the active
//! session. The remote tool owns the schema: documents are loaded verbatim
//! and unknown keys round-trip unchanged. `patch` is pure; `save` is only
//! called when at least one patch key was supplied.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, RiptideError};
use crate::session::{RemoteSession, Transport};

/// Remote settings path. SFTP resolves relative paths against the remote
/// user's home directory.
pub const SETTINGS_PATH: &str = ".config/tidal_dl_ng/settings.json";

/// Caller-supplied key/value overrides, applied in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    entries: Vec<(String, String)>,
}

impl ConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one override. Later entries for the same key win, since
    /// application order follows insertion order.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The remote tool's persisted settings, modeled as an opaque key/value
/// mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    values: Map<String, Value>,
}

impl ConfigDocument {
    /// The first-run document: no keys at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    fn from_json(data: &[u8], path: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(data).map_err(|e| RiptideError::ConfigParse {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(RiptideError::ConfigParse {
                path: path.to_string(),
                message: format!("expected a JSON object, found {}", json_kind(&other)),
            }),
        }
    }

    pub(crate) fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&Value::Object(self.values.clone())).map_err(|e| {
            RiptideError::ConfigParse {
                path: SETTINGS_PATH.to_string(),
                message: e.to_string(),
            }
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read and parse the remote settings document.
///
/// A missing file is the distinct, recoverable `ConfigMissing`; a file
/// that exists but fails to parse is a hard error.
pub fn load<T: Transport>(session: &mut RemoteSession<T>) -> Result<ConfigDocument> {
    match session.read_file(SETTINGS_PATH)? {
        Some(data) => {
            let doc = ConfigDocument::from_json(&data, SETTINGS_PATH)?;
            debug!(keys = doc.len(), "loaded remote settings");
            Ok(doc)
        }
        None => Err(RiptideError::ConfigMissing {
            path: SETTINGS_PATH.to_string(),
        }),
    }
}

/// Apply the patch in insertion order. Pure and in-memory: only patched
/// keys change, everything else carries through untouched.
pub fn patch(doc: &ConfigDocument, patch: &ConfigPatch) -> ConfigDocument {
    let mut values = doc.values.clone();
    for (key, value) in patch.entries() {
        values.insert(key.clone(), coerce_value(value));
    }
    ConfigDocument { values }
}

/// Store a caller-supplied value. Scalars that parse as JSON keep their
/// type (`true`, `3`, `null`); everything else stays a string. No schema
/// validation happens here.
fn coerce_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}

/// Write the document back to the fixed remote path.
pub fn save<T: Transport>(session: &mut RemoteSession<T>, doc: &ConfigDocument) -> Result<()> {
    let body = doc.to_json()?;
    session.write_file(SETTINGS_PATH, body.as_bytes())?;
    debug!(keys = doc.len(), "saved remote settings");
    Ok(())
}
