//! Trust delegation for release signatures.
//!
//! nodeup does not implement PGP. Key management and detached signature
//! verification are delegated to a [`TrustStore`], whose production
//! implementation drives the `gpg` command line ([`GpgTrustStore`]).
//! Tests substitute an in-memory store.

pub mod gpg;

use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

use crate::core::UpdaterError;

pub use gpg::GpgTrustStore;

/// The capabilities the verifier needs from a keyring.
///
/// Every method reports the tool's verdict as `Ok(bool)`; `Err` is reserved for
/// failing to ask at all (tool missing, timeout).
#[allow(async_fn_in_trait)]
pub trait TrustStore {
    /// Whether the key with this fingerprint is in the keyring.
    async fn has_key(&self, key_id: &str) -> Result<bool>;

    /// Import the armored key published at `url`.
    async fn import_key_from_url(&self, url: &str) -> Result<bool>;

    /// Import a key by fingerprint from the default key server.
    async fn import_key_from_server(&self, key_id: &str) -> Result<bool>;

    /// Verify a detached signature over `data`, or a clearsigned file when
    /// `data` is `None`.
    async fn verify_detached(&self, signature: &Path, data: Option<&Path>) -> Result<bool>;
}

/// Make sure `key_id` is trusted, importing it if necessary.
///
/// The published key URL is tried first, then the key server. Each import
/// counts only if the fingerprint is present afterwards.
pub async fn ensure_key<T: TrustStore>(store: &T, key_id: &str, key_url: &str) -> Result<()> {
    if store.has_key(key_id).await? {
        return Ok(());
    }

    info!("Importing key {} from {}", key_id, key_url);
    store.import_key_from_url(key_url).await?;
    if store.has_key(key_id).await? {
        return Ok(());
    }

    warn!("Key {} not found at {}, trying the key server", key_id, key_url);
    store.import_key_from_server(key_id).await?;
    if store.has_key(key_id).await? {
        return Ok(());
    }

    Err(UpdaterError::VerificationFailed {
        subject: format!("signing key {key_id}"),
        reason: "the key could not be imported".to_string(),
    }
    .into())
}
