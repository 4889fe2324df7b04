use std::time::Duration;

use async_trait::async_trait;
use nostr_sdk::prelude::*;
use tracing::{debug, info};

use crate::config::CollabConfig;
use crate::events::{EventDraft, NostrEvent, NostrTag};
use crate::Error;

/// Relay query: `kinds`, optional `authors`, optional `#d` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordFilter {
    pub kinds: Vec<u16>,
    pub authors: Vec<String>,
    pub identifier: Option<String>,
}

impl RecordFilter {
    pub fn new(kind: u16) -> Self {
        Self {
            kinds: vec![kind],
            ..Default::default()
        }
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Whether `event` satisfies this filter. Used to re-check relay output.
    pub fn matches(&self, event: &NostrEvent) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.iter().any(|a| a == &event.pubkey) {
            return false;
        }
        match &self.identifier {
            Some(identifier) => event.identifier() == Some(identifier.as_str()),
            None => true,
        }
    }

    fn to_sdk_filter(&self) -> Result<Filter, Error> {
        let mut filter = Filter::new().kinds(self.kinds.iter().map(|k| Kind::from(*k)));

        if !self.authors.is_empty() {
            let authors = self
                .authors
                .iter()
                .map(|value| PublicKey::parse(value).map_err(Error::from))
                .collect::<Result<Vec<_>, _>>()?;
            filter = filter.authors(authors);
        }

        if let Some(identifier) = &self.identifier {
            filter = filter.identifier(identifier.clone());
        }

        Ok(filter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Supersedes the previous event for the same author + kind + identifier.
    Replaceable,
    /// Retained alongside every earlier event.
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub event_id: String,
    pub success: usize,
    pub failed: usize,
}

/// Relay query and publish capability.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Live query against the relays; never answered from a local cache.
    async fn query(&self, filter: RecordFilter) -> Result<Vec<NostrEvent>, Error>;
    async fn publish_replaceable(&self, event: &NostrEvent) -> Result<PublishResult, Error>;
    async fn publish_append(&self, event: &NostrEvent) -> Result<PublishResult, Error>;
}

/// Signing capability. May be local or remote.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn public_key(&self) -> Result<String, Error>;
    async fn sign(&self, draft: EventDraft) -> Result<NostrEvent, Error>;
}

/// [`RelayTransport`] over a connected nostr-sdk [`Client`].
#[derive(Clone)]
pub struct NostrRelayClient {
    client: Client,
    timeout: Duration,
    min_acks: usize,
}

impl NostrRelayClient {
    pub async fn new(config: &CollabConfig) -> Result<Self, Error> {
        let client = Client::default();

        for relay in &config.relays {
            client.add_relay(relay).await?;
        }

        client.connect().await;
        info!(relays = config.relays.len(), "Connected to nostr relays");
        Ok(Self {
            client,
            timeout: config.timeout,
            min_acks: config.min_acks,
        })
    }

    async fn send(&self, record: &NostrEvent, mode: PublishMode) -> Result<PublishResult, Error> {
        let event =
            Event::from_json(&record.raw_json).map_err(|e| Error::Transport(e.to_string()))?;
        let output = tokio::time::timeout(self.timeout, self.client.send_event(&event))
            .await
            .map_err(|_| Error::Timeout)??;

        let success = output.success.len();
        let failed = output.failed.len();
        if self.min_acks > 0 && success < self.min_acks {
            return Err(Error::Quorum {
                required: self.min_acks,
                actual: success,
            });
        }

        let event_id = output.id().to_string();
        info!(event_id = %event_id, kind = record.kind, ?mode, success, failed, "Published nostr event");

        Ok(PublishResult {
            event_id,
            success,
            failed,
        })
    }
}

#[async_trait]
impl RelayTransport for NostrRelayClient {
    async fn query(&self, filter: RecordFilter) -> Result<Vec<NostrEvent>, Error> {
        let sdk_filter = filter.to_sdk_filter()?;
        let events = self.client.fetch_events(sdk_filter, self.timeout).await?;
        let records: Vec<NostrEvent> = events.iter().map(NostrEvent::from_event).collect();
        debug!(kinds = ?filter.kinds, count = records.len(), "Fetched nostr events");
        Ok(records)
    }

    async fn publish_replaceable(&self, event: &NostrEvent) -> Result<PublishResult, Error> {
        self.send(event, PublishMode::Replaceable).await
    }

    async fn publish_append(&self, event: &NostrEvent) -> Result<PublishResult, Error> {
        self.send(event, PublishMode::Append).await
    }
}

/// [`Signer`] holding local nostr [`Keys`].
#[derive(Clone)]
pub struct KeysSigner {
    keys: Keys,
}

impl KeysSigner {
    pub fn new(keys: Keys) -> Self {
        Self { keys }
    }

    /// Accepts hex or `nsec` secret keys.
    pub fn parse(secret_key: &str) -> Result<Self, Error> {
        Ok(Self::new(Keys::parse(secret_key)?))
    }
}

#[async_trait]
impl Signer for KeysSigner {
    async fn public_key(&self) -> Result<String, Error> {
        Ok(self.keys.public_key().to_hex())
    }

    async fn sign(&self, draft: EventDraft) -> Result<NostrEvent, Error> {
        let tags = draft
            .tags
            .iter()
            .map(NostrTag::to_sdk_tag)
            .collect::<Result<Vec<_>, _>>()?;
        let event = EventBuilder::new(Kind::from(draft.kind), draft.content)
            .tags(tags)
            .custom_created_at(Timestamp::from(draft.created_at))
            .sign_with_keys(&self.keys)
            .map_err(|e| Error::Signer(e.to_string()))?;
        Ok(NostrEvent::from_event(&event))
    }
}
