//! Credential registry
//!
//! Maps OAuth client ids to their secret and the portal account they log in
//! with. Credentials are kept as raw JSON and decoded on lookup, so a
//! hand-edited clients file with the wrong shape is reported per client
//! instead of failing the whole load.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::common::auth::constant_time_eq;
use crate::login::model::Credentials;
use crate::store::{IdentityCodec, SecretCodec};

/// Credentials fields obscured in the clients file
const SECRET_FIELDS: &[&str] = &["password", "otpSecret"];

/// Credentials registered for a client do not decode into [`Credentials`]
#[derive(Debug, Error)]
#[error("credentials of client {client_id:?}: got {found}, expected credentials object: {source}")]
pub struct RegistryShapeError {
    pub client_id: String,
    pub found: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// One registered OAuth client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_url: String,
    #[serde(default)]
    pub credentials: Value,
    #[serde(default = "Utc::now")]
    pub registered_at: DateTime<Utc>,
}

pub struct CredentialRegistry {
    clients: RwLock<BTreeMap<String, ClientRegistration>>,
    path: Option<PathBuf>,
    codec: Arc<dyn SecretCodec>,
}

impl CredentialRegistry {
    pub fn in_memory() -> Self {
        Self {
            clients: RwLock::new(BTreeMap::new()),
            path: None,
            codec: Arc::new(IdentityCodec),
        }
    }

    /// Load the clients file; a missing or empty file is an empty registry.
    ///
    /// Account secrets are kept obscured by `codec` on disk.
    pub fn load<P: AsRef<Path>>(path: P, codec: Arc<dyn SecretCodec>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let mut clients = BTreeMap::new();
        if path.exists() {
            let content = fs::read_to_string(path)?;
            if !content.trim().is_empty() {
                let entries: Vec<ClientRegistration> = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse clients file: {}", path.display()))?;
                for mut entry in entries {
                    map_secrets(&mut entry.credentials, |v| codec.reveal(v)).map_err(|e| {
                        anyhow::anyhow!(
                            "Failed to reveal secrets of client {:?}: {}",
                            entry.client_id,
                            e
                        )
                    })?;
                    clients.insert(entry.client_id.clone(), entry);
                }
            }
        }

        Ok(Self {
            clients: RwLock::new(clients),
            path: Some(path.to_path_buf()),
            codec,
        })
    }

    /// Register or replace a client
    pub fn register(
        &self,
        client_id: &str,
        client_secret: &str,
        redirect_url: &str,
        credentials: &Credentials,
    ) -> anyhow::Result<()> {
        let entry = ClientRegistration {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_url: redirect_url.to_string(),
            credentials: serde_json::to_value(credentials)?,
            registered_at: Utc::now(),
        };

        let mut clients = self.clients.write();
        let mut next = clients.clone();
        next.insert(client_id.to_string(), entry);
        self.persist(&next)?;
        *clients = next;

        tracing::info!(client_id, "Client registered");
        Ok(())
    }

    /// Remove a client; returns whether it existed
    pub fn revoke(&self, client_id: &str) -> anyhow::Result<bool> {
        let mut clients = self.clients.write();
        if !clients.contains_key(client_id) {
            return Ok(false);
        }

        let mut next = clients.clone();
        next.remove(client_id);
        self.persist(&next)?;
        *clients = next;

        tracing::info!(client_id, "Client revoked");
        Ok(true)
    }

    /// Credentials of a client; `None` for unknown clients or a null entry
    pub fn credentials_for(
        &self,
        client_id: &str,
    ) -> Result<Option<Credentials>, RegistryShapeError> {
        let clients = self.clients.read();
        let Some(entry) = clients.get(client_id) else {
            return Ok(None);
        };

        if entry.credentials.is_null() {
            return Ok(None);
        }

        serde_json::from_value(entry.credentials.clone())
            .map(Some)
            .map_err(|source| RegistryShapeError {
                client_id: client_id.to_string(),
                found: json_kind(&entry.credentials),
                source,
            })
    }

    /// Constant-time check of a client secret
    pub fn verify_secret(&self, client_id: &str, client_secret: &str) -> bool {
        self.clients
            .read()
            .get(client_id)
            .is_some_and(|entry| constant_time_eq(&entry.client_secret, client_secret))
    }

    pub fn clients(&self) -> Vec<ClientRegistration> {
        self.clients.read().values().cloned().collect()
    }

    /// Write `clients` to the clients file, secrets obscured
    fn persist(&self, clients: &BTreeMap<String, ClientRegistration>) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut entries: Vec<ClientRegistration> = clients.values().cloned().collect();
        for entry in &mut entries {
            // obscuring cannot fail
            let _ = map_secrets(&mut entry.credentials, |v| Ok(self.codec.obscure(v)));
        }

        let json = serde_json::to_string_pretty(&entries).context("Failed to serialize clients")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write clients file: {}", path.display()))?;
        Ok(())
    }
}

/// Apply `f` to the secret fields of a credentials object; other shapes are left alone
fn map_secrets(
    credentials: &mut Value,
    f: impl Fn(&str) -> Result<String, String>,
) -> Result<(), String> {
    let Value::Object(fields) = credentials else {
        return Ok(());
    };

    for key in SECRET_FIELDS {
        if let Some(Value::String(secret)) = fields.get_mut(*key) {
            if !secret.is_empty() {
                *secret = f(secret)?;
            }
        }
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = CredentialRegistry::in_memory();
        let creds = Credentials::new("alice", "hunter2", "ABCD");
        registry
            .register("client-1", "s3cret", "http://localhost/cb", &creds)
            .unwrap();

        assert_eq!(registry.credentials_for("client-1").unwrap(), Some(creds));
        assert_eq!(registry.credentials_for("unknown").unwrap(), None);
        assert!(registry.verify_secret("client-1", "s3cret"));
        assert!(!registry.verify_secret("client-1", "wrong"));
        assert!(!registry.verify_secret("unknown", "s3cret"));
    }

    #[test]
    fn test_revoke() {
        let registry = CredentialRegistry::in_memory();
        registry
            .register("client-1", "s3cret", "", &Credentials::new("alice", "hunter2", ""))
            .unwrap();

        assert!(registry.revoke("client-1").unwrap());
        assert!(!registry.revoke("client-1").unwrap());
        assert_eq!(registry.credentials_for("client-1").unwrap(), None);
    }

    #[test]
    fn test_wrong_shape_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.json");
        fs::write(
            &path,
            r#"[{"clientId":"broken","clientSecret":"x","credentials":"alice:hunter2"}]"#,
        )
        .unwrap();

        let registry = CredentialRegistry::load(&path, Arc::new(IdentityCodec)).unwrap();
        let err = registry.credentials_for("broken").unwrap_err();
        assert_eq!(err.client_id, "broken");
        assert_eq!(err.found, "string");
    }

    #[test]
    fn test_null_credentials_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.json");
        fs::write(&path, r#"[{"clientId":"bare","clientSecret":"x"}]"#).unwrap();

        let registry = CredentialRegistry::load(&path, Arc::new(IdentityCodec)).unwrap();
        assert_eq!(registry.credentials_for("bare").unwrap(), None);
        assert!(registry.verify_secret("bare", "x"));
    }

    #[test]
    fn test_persists_to_clients_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.json");

        let registry = CredentialRegistry::load(&path, Arc::new(IdentityCodec)).unwrap();
        assert!(registry.clients().is_empty());
        registry
            .register("client-1", "s3cret", "", &Credentials::new("alice", "hunter2", ""))
            .unwrap();

        let reloaded = CredentialRegistry::load(&path, Arc::new(IdentityCodec)).unwrap();
        assert_eq!(reloaded.clients().len(), 1);
        assert_eq!(
            reloaded.credentials_for("client-1").unwrap().unwrap().username(),
            "alice"
        );
    }

    /// Codec reversing secrets, so obscured values differ from the plaintext
    struct ReverseCodec;

    impl SecretCodec for ReverseCodec {
        fn obscure(&self, value: &str) -> String {
            value.chars().rev().collect()
        }

        fn reveal(&self, value: &str) -> Result<String, String> {
            Ok(value.chars().rev().collect())
        }
    }

    #[test]
    fn test_clients_file_holds_obscured_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.json");

        let registry = CredentialRegistry::load(&path, Arc::new(ReverseCodec)).unwrap();
        let creds = Credentials::new("alice", "hunter2", "GEZDGNBV");
        registry.register("client-1", "s3cret", "", &creds).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("hunter2"));
        assert!(!raw.contains("GEZDGNBV"));
        assert!(raw.contains("2retnuh"));
        assert!(raw.contains("alice"));

        // in memory the secrets stay usable
        assert_eq!(registry.credentials_for("client-1").unwrap(), Some(creds.clone()));

        let reloaded = CredentialRegistry::load(&path, Arc::new(ReverseCodec)).unwrap();
        assert_eq!(reloaded.credentials_for("client-1").unwrap(), Some(creds));
    }

    #[test]
    fn test_failed_write_leaves_registry_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("clients.json");

        let registry = CredentialRegistry::load(&path, Arc::new(IdentityCodec)).unwrap();
        let creds = Credentials::new("alice", "hunter2", "");
        assert!(registry.register("client-1", "s3cret", "", &creds).is_err());

        assert!(registry.clients().is_empty());
        assert!(!registry.verify_secret("client-1", "s3cret"));
    }
}
