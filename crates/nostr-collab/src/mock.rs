//! In-memory relay, signer and NIP-05 lookup for tests and offline use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::events::{compute_event_id, EventDraft, NostrEvent};
use crate::resolve::Nip05Lookup;
use crate::transport::{PublishMode, PublishResult, RecordFilter, RelayTransport, Signer};
use crate::Error;

/// X-only coordinates of G, 2G and 3G on secp256k1: valid public keys with
/// no secret attached, for fixtures.
pub const SAMPLE_PUBKEYS: [&str; 3] = [
    "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
    "c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5",
    "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9",
];

/// A single in-process relay.
///
/// Replaceable publishes keep only the newest event per
/// `(author, kind, identifier)`; append publishes keep everything.
#[derive(Default)]
pub struct MemoryRelay {
    events: Mutex<Vec<NostrEvent>>,
    publishes: Mutex<Vec<(PublishMode, NostrEvent)>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an event directly, bypassing publish semantics.
    pub fn insert(&self, event: NostrEvent) -> Result<(), Error> {
        self.events
            .lock()
            .map_err(|_| Error::MutexPoisoned)?
            .push(event);
        Ok(())
    }

    pub fn events(&self) -> Result<Vec<NostrEvent>, Error> {
        Ok(self.events.lock().map_err(|_| Error::MutexPoisoned)?.clone())
    }

    /// Every publish call received, in order.
    pub fn publishes(&self) -> Result<Vec<(PublishMode, NostrEvent)>, Error> {
        Ok(self
            .publishes
            .lock()
            .map_err(|_| Error::MutexPoisoned)?
            .clone())
    }

    fn record(&self, mode: PublishMode, event: &NostrEvent) -> Result<PublishResult, Error> {
        self.publishes
            .lock()
            .map_err(|_| Error::MutexPoisoned)?
            .push((mode, event.clone()));
        Ok(PublishResult {
            event_id: event.event_id.clone(),
            success: 1,
            failed: 0,
        })
    }
}

fn same_slot(a: &NostrEvent, b: &NostrEvent) -> bool {
    a.pubkey == b.pubkey
        && a.kind == b.kind
        && a.identifier().unwrap_or("") == b.identifier().unwrap_or("")
}

fn supersedes(new: &NostrEvent, old: &NostrEvent) -> bool {
    new.created_at > old.created_at
        || (new.created_at == old.created_at && new.event_id < old.event_id)
}

#[async_trait]
impl RelayTransport for MemoryRelay {
    async fn query(&self, filter: RecordFilter) -> Result<Vec<NostrEvent>, Error> {
        let events = self.events.lock().map_err(|_| Error::MutexPoisoned)?;
        Ok(events
            .iter()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect())
    }

    async fn publish_replaceable(&self, event: &NostrEvent) -> Result<PublishResult, Error> {
        {
            let mut events = self.events.lock().map_err(|_| Error::MutexPoisoned)?;
            let stale = events
                .iter()
                .filter(|existing| same_slot(existing, event))
                .all(|existing| supersedes(event, existing));
            if stale {
                events.retain(|existing| !same_slot(existing, event));
                events.push(event.clone());
            }
        }
        self.record(PublishMode::Replaceable, event)
    }

    async fn publish_append(&self, event: &NostrEvent) -> Result<PublishResult, Error> {
        self.insert(event.clone())?;
        self.record(PublishMode::Append, event)
    }
}

/// Signs with a fixed pubkey and deterministic NIP-01 ids. No real signature.
///
/// The pubkey must be a valid x-only key, see [`SAMPLE_PUBKEYS`].
#[derive(Debug, Clone)]
pub struct StaticSigner {
    pubkey: String,
    delay: Option<Duration>,
}

impl StaticSigner {
    pub fn new(pubkey: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            delay: None,
        }
    }

    /// Every call waits `delay` first, like a slow remote signer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Signer for StaticSigner {
    async fn public_key(&self) -> Result<String, Error> {
        self.wait().await;
        Ok(self.pubkey.clone())
    }

    async fn sign(&self, draft: EventDraft) -> Result<NostrEvent, Error> {
        self.wait().await;
        let event_id = compute_event_id(
            &self.pubkey,
            draft.created_at,
            draft.kind,
            &draft.tags,
            &draft.content,
        )?;
        let tags: Vec<Vec<String>> = draft.tags.iter().map(|t| t.to_parts()).collect();
        let raw_json = serde_json::json!({
            "id": event_id,
            "pubkey": self.pubkey,
            "created_at": draft.created_at,
            "kind": draft.kind,
            "tags": tags,
            "content": draft.content,
        })
        .to_string();

        Ok(NostrEvent {
            event_id,
            kind: draft.kind,
            pubkey: self.pubkey.clone(),
            created_at: draft.created_at,
            content: draft.content,
            tags: draft.tags,
            raw_json,
        })
    }
}

/// NIP-05 table held in memory; counts lookups.
#[derive(Default)]
pub struct StaticNip05 {
    entries: HashMap<String, String>,
    calls: AtomicUsize,
    fail: bool,
}

impl StaticNip05 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, identifier: &str, pubkey: &str) -> Self {
        self.entries
            .insert(identifier.to_lowercase(), pubkey.to_string());
        self
    }

    /// Every lookup fails as if the domain were unreachable.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Nip05Lookup for StaticNip05 {
    async fn lookup(&self, identifier: &str) -> Result<Option<String>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Network(format!("{identifier}: unreachable")));
        }
        Ok(self.entries.get(&identifier.trim().to_lowercase()).cloned())
    }
}
