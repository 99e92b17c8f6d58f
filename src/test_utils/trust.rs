//! In-memory [`TrustStore`] for tests that must not touch a real keyring.

use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use crate::trust::TrustStore;

/// How [`FakeTrustStore::verify_detached`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyPolicy {
    /// Valid whenever the signature file exists.
    Accept,
    /// Never valid.
    Reject,
}

/// A keyring simulation that records every call.
pub struct FakeTrustStore {
    policy: VerifyPolicy,
    keys: Mutex<HashSet<String>>,
    url_key: Option<String>,
    server_key: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeTrustStore {
    /// An empty keyring answering verifications per `policy`.
    pub fn new(policy: VerifyPolicy) -> Self {
        Self {
            policy,
            keys: Mutex::new(HashSet::new()),
            url_key: None,
            server_key: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Start with `key_id` already imported.
    pub fn with_key(self, key_id: &str) -> Self {
        if let Ok(mut keys) = self.keys.lock() {
            keys.insert(key_id.to_string());
        }
        self
    }

    /// Importing from any URL yields `key_id`.
    pub fn importable_from_url(mut self, key_id: &str) -> Self {
        self.url_key = Some(key_id.to_string());
        self
    }

    /// Importing from the key server yields `key_id`.
    pub fn importable_from_server(mut self, key_id: &str) -> Self {
        self.server_key = Some(key_id.to_string());
        self
    }

    /// Calls received so far, e.g. `"has_key <id>"`, `"verify <file name>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn import(&self, key: Option<&String>) -> bool {
        match (key, self.keys.lock()) {
            (Some(key), Ok(mut keys)) => {
                keys.insert(key.clone());
                true
            }
            _ => false,
        }
    }
}

impl TrustStore for FakeTrustStore {
    async fn has_key(&self, key_id: &str) -> Result<bool> {
        self.record(format!("has_key {key_id}"));
        Ok(self.keys.lock().map(|keys| keys.contains(key_id)).unwrap_or(false))
    }

    async fn import_key_from_url(&self, url: &str) -> Result<bool> {
        self.record(format!("import_url {url}"));
        Ok(self.import(self.url_key.as_ref()))
    }

    async fn import_key_from_server(&self, key_id: &str) -> Result<bool> {
        self.record(format!("import_server {key_id}"));
        Ok(self.import(self.server_key.as_ref()))
    }

    async fn verify_detached(&self, signature: &Path, _data: Option<&Path>) -> Result<bool> {
        let name =
            signature.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        self.record(format!("verify {name}"));
        Ok(match self.policy {
            VerifyPolicy::Accept => signature.is_file(),
            VerifyPolicy::Reject => false,
        })
    }
}
