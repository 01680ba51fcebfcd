use super::SecretStore;
use crate::config::{VaultConfig, WorkspaceConfig, WORKSPACE_ID_ENV};
use crate::error::{AppError, Result};
use std::path::PathBuf;

/// Workspace credentials, resolved once per job and passed to the API client
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub workspace_id: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(workspace_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            api_key: api_key.into(),
        }
    }

    /// Resolve the workspace id from configuration and the API key from the secret store
    pub fn resolve(
        workspace: &WorkspaceConfig,
        vault: &VaultConfig,
        store: &dyn SecretStore,
    ) -> Result<Self> {
        let workspace_id = workspace.id.trim();
        if workspace_id.is_empty() {
            return Err(AppError::Configuration(format!(
                "Workspace id is not configured (set {} or workspace.id)",
                WORKSPACE_ID_ENV
            )));
        }

        let secret = store.get_secret(&vault.api_secret)?;
        let api_key = secret.require(&vault.api_key_field)?;

        tracing::info!(workspace_id = %workspace_id, secret = %vault.api_secret, "Credentials resolved");
        Ok(Self::new(workspace_id, api_key))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("workspace_id", &self.workspace_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Connection parameters for the optional database sink
#[derive(Clone)]
pub struct DatabaseSecret {
    pub database: String,
    pub username: String,
    pub password: String,
    pub location: String,
}

impl DatabaseSecret {
    pub fn resolve(vault: &VaultConfig, store: &dyn SecretStore) -> Result<Self> {
        let secret = store.get_secret(&vault.database_secret)?;
        Ok(Self {
            database: secret.require("database")?.to_string(),
            username: secret.require("username")?.to_string(),
            password: secret.require("password")?.to_string(),
            location: secret.get("location").unwrap_or_default().to_string(),
        })
    }

    /// Database file for the embedded backend: `<location>/<database>`
    pub fn database_path(&self) -> PathBuf {
        if self.location.trim().is_empty() {
            PathBuf::from(&self.database)
        } else {
            PathBuf::from(&self.location).join(&self.database)
        }
    }
}

impl std::fmt::Debug for DatabaseSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSecret")
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("location", &self.location)
            .finish()
    }
}
