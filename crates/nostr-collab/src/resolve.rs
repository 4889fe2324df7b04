//! Maps user-supplied identifiers (hex pubkey, `npub`, NIP-05) to hex pubkeys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::address::decode_npub;
use crate::events::is_hex_pubkey;
use crate::Error;

const NPUB_PREFIX: &str = "npub1";

/// External NIP-05 lookup (`name@domain` -> hex pubkey).
#[async_trait]
pub trait Nip05Lookup: Send + Sync {
    /// `Ok(None)` when the lookup succeeded but no account matched.
    async fn lookup(&self, identifier: &str) -> Result<Option<String>, Error>;
}

#[derive(Debug, Deserialize)]
struct Nip05Document {
    #[serde(default)]
    names: HashMap<String, String>,
}

/// Resolves NIP-05 identifiers against `https://<domain>/.well-known/nostr.json`.
#[derive(Clone)]
pub struct HttpNip05Lookup {
    client: reqwest::Client,
}

impl HttpNip05Lookup {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Nip05Lookup for HttpNip05Lookup {
    async fn lookup(&self, identifier: &str) -> Result<Option<String>, Error> {
        let Some((name, domain)) = split_nip05(identifier) else {
            return Ok(None);
        };

        let url = format!("https://{domain}/.well-known/nostr.json");
        debug!(url = %url, name = %name, "NIP-05 lookup");

        let document: Nip05Document = self
            .client
            .get(&url)
            .query(&[("name", name.as_str())])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::Network(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(document
            .names
            .get(&name)
            .filter(|value| is_hex_pubkey(value))
            .map(|value| value.to_lowercase()))
    }
}

/// Memoizes successful lookups for the lifetime of this handle.
pub struct CachedNip05Lookup {
    inner: Arc<dyn Nip05Lookup>,
    cache: Mutex<HashMap<String, String>>,
}

impl CachedNip05Lookup {
    pub fn new(inner: Arc<dyn Nip05Lookup>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached(&self) -> Result<usize, Error> {
        Ok(self.cache.lock().map_err(|_| Error::MutexPoisoned)?.len())
    }
}

#[async_trait]
impl Nip05Lookup for CachedNip05Lookup {
    async fn lookup(&self, identifier: &str) -> Result<Option<String>, Error> {
        let key = identifier.trim().to_lowercase();
        {
            let cache = self.cache.lock().map_err(|_| Error::MutexPoisoned)?;
            if let Some(pubkey) = cache.get(&key) {
                return Ok(Some(pubkey.clone()));
            }
        }

        let resolved = self.inner.lookup(identifier).await?;
        if let Some(pubkey) = &resolved {
            let mut cache = self.cache.lock().map_err(|_| Error::MutexPoisoned)?;
            cache.insert(key, pubkey.clone());
        }
        Ok(resolved)
    }
}

/// Dispatches on the syntactic shape of the input, in a fixed order:
/// hex pubkey, `npub`, NIP-05, otherwise unrecognized.
#[derive(Clone)]
pub struct IdentifierResolver {
    nip05: Arc<dyn Nip05Lookup>,
}

impl IdentifierResolver {
    pub fn new(nip05: Arc<dyn Nip05Lookup>) -> Self {
        Self { nip05 }
    }

    pub async fn resolve(&self, input: &str) -> Result<String, Error> {
        let trimmed = input.trim();

        if is_hex_pubkey(trimmed) {
            return Ok(trimmed.to_lowercase());
        }

        if trimmed.starts_with(NPUB_PREFIX) {
            return decode_npub(trimmed).map_err(|e| Error::InvalidEncoding(format!("{trimmed}: {e}")));
        }

        if trimmed.contains('@') {
            return match self.nip05.lookup(trimmed).await {
                Ok(Some(pubkey)) => Ok(pubkey),
                Ok(None) => Err(Error::NotFound(trimmed.to_string())),
                Err(Error::Network(reason)) => Err(Error::Network(reason)),
                Err(other) => Err(Error::Network(other.to_string())),
            };
        }

        Err(Error::UnrecognizedFormat(trimmed.to_string()))
    }
}

/// `name@domain` -> (`name`, `domain`); an empty name is `_`.
fn split_nip05(identifier: &str) -> Option<(String, String)> {
    let (name, domain) = identifier.trim().split_once('@')?;
    let domain = domain.trim().to_lowercase();
    if domain.is_empty() {
        return None;
    }
    let name = if name.is_empty() {
        "_".to_string()
    } else {
        name.to_lowercase()
    };
    Some((name, domain))
}
