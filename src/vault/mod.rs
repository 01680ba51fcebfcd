//! Secret bundles and the stores that serve them.
//!
//! A bundle is a named map of string fields (e.g. `get_processes` → `{api}`).
//! Stores are read once at job start; nothing is cached between runs.

mod credentials;

pub use credentials::{Credentials, DatabaseSecret};

use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Named bundle of secret fields
#[derive(Clone, Default)]
pub struct Secret {
    name: String,
    fields: HashMap<String, String>,
}

impl Secret {
    pub fn new(name: impl Into<String>, fields: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Get a field that must be present and non-empty
    pub fn require(&self, field: &str) -> Result<&str> {
        match self.get(field) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            Some(_) => Err(AppError::Secret(format!(
                "Field '{}' of secret '{}' is empty",
                field, self.name
            ))),
            None => Err(AppError::Secret(format!(
                "Secret '{}' has no field '{}'",
                self.name, field
            ))),
        }
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.fields.keys().collect();
        keys.sort();
        f.debug_struct("Secret")
            .field("name", &self.name)
            .field("fields", &keys)
            .finish()
    }
}

/// Source of secret bundles
pub trait SecretStore: Send + Sync {
    /// Fetch a bundle by name
    fn get_secret(&self, name: &str) -> Result<Secret>;
}

/// Secret store backed by a local JSON file of the form
/// `{ "<bundle>": { "<field>": "<value>" } }`
#[derive(Debug, Clone)]
pub struct FileVault {
    path: PathBuf,
}

impl FileVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_bundles(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            AppError::Secret(format!(
                "Failed to read secret file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Object(bundles)) => Ok(bundles),
            Ok(_) => Err(AppError::Secret(format!(
                "Secret file {} must contain a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(AppError::Secret(format!(
                "Secret file {} is not valid JSON: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

impl SecretStore for FileVault {
    fn get_secret(&self, name: &str) -> Result<Secret> {
        let mut bundles = self.read_bundles()?;
        let bundle = bundles
            .remove(name)
            .ok_or_else(|| AppError::Secret(format!("Secret '{}' not found", name)))?;

        let serde_json::Value::Object(map) = bundle else {
            return Err(AppError::Secret(format!(
                "Secret '{}' must be an object of string fields",
                name
            )));
        };

        let mut fields = HashMap::with_capacity(map.len());
        for (key, value) in map {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(AppError::Secret(format!(
                        "Field '{}' of secret '{}' must be a scalar",
                        key, name
                    )))
                }
            };
            fields.insert(key, value);
        }

        tracing::debug!(secret = name, field_count = fields.len(), "Secret loaded");
        Ok(Secret::new(name, fields))
    }
}

/// In-process secret store
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    secrets: HashMap<String, Secret>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bundle built from `(field, value)` pairs
    pub fn with_secret<K, V>(mut self, name: &str, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.secrets
            .insert(name.to_string(), Secret::new(name, fields));
        self
    }
}

impl SecretStore for MemoryVault {
    fn get_secret(&self, name: &str) -> Result<Secret> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::Secret(format!("Secret '{}' not found", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_require_rejects_missing_and_empty_fields() {
        let vault = MemoryVault::new().with_secret("bundle", [("api", "k"), ("blank", "  ")]);
        let secret = vault.get_secret("bundle").unwrap();

        assert_eq!(secret.require("api").unwrap(), "k");
        assert!(matches!(secret.require("blank"), Err(AppError::Secret(_))));
        assert!(matches!(secret.require("other"), Err(AppError::Secret(_))));
    }

    #[test]
    fn test_debug_does_not_leak_values() {
        let vault = MemoryVault::new().with_secret("bundle", [("api", "super-secret")]);
        let rendered = format!("{:?}", vault.get_secret("bundle").unwrap());
        assert!(rendered.contains("api"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_file_vault_reads_bundle() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"get_processes": {{"api": "abc123"}}, "db_connect": {{"database": "runs.db", "port": 3306}}}}"#
        )
        .unwrap();

        let vault = FileVault::new(file.path());
        assert_eq!(vault.get_secret("get_processes").unwrap().require("api").unwrap(), "abc123");
        assert_eq!(vault.get_secret("db_connect").unwrap().get("port"), Some("3306"));
        assert!(matches!(vault.get_secret("missing"), Err(AppError::Secret(_))));
    }

    #[test]
    fn test_file_vault_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();
        assert!(matches!(
            FileVault::new(file.path()).get_secret("get_processes"),
            Err(AppError::Secret(_))
        ));

        assert!(matches!(
            FileVault::new("/nonexistent/vault.json").get_secret("get_processes"),
            Err(AppError::Secret(_))
        ));
    }

    #[test]
    fn test_file_vault_rejects_nested_field() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"get_processes": {{"api": {{"nested": true}}}}}}"#).unwrap();
        assert!(FileVault::new(file.path()).get_secret("get_processes").is_err());
    }
}
