//! Pointer records: the authorization anchor of a collaborative document.
//!
//! Reads follow one pattern: query every relay broadly, re-check what came
//! back, then reduce to the newest record. Relays are not trusted to
//! deduplicate, order or agree with each other.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::{debug, warn};

use crate::address::AddressPointer;
use crate::events::{
    coordinate, d_tag, is_hex_pubkey, k_tag, p_tag, EventDraft, NostrEvent, TAG_AUTHOR,
    TAG_TARGET_KIND,
};
use crate::transport::{PublishResult, RecordFilter, RelayTransport};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointerRecord {
    /// Empty until signed.
    pub event_id: String,
    pub kind: u16,
    pub identifier: String,
    /// Publisher of this pointer instance.
    pub author_pubkey: String,
    pub target_kind: u16,
    /// Ordered, de-duplicated; always contains `author_pubkey`.
    pub authorized_pubkeys: Vec<String>,
    pub created_at: u64,
}

impl PointerRecord {
    /// Unsigned pointer. The publisher is listed first.
    pub fn new(
        kind: u16,
        author_pubkey: &str,
        identifier: &str,
        target_kind: u16,
        collaborators: &[String],
    ) -> Self {
        let mut authorized = vec![author_pubkey.to_string()];
        for pubkey in collaborators {
            push_unique(&mut authorized, pubkey);
        }

        Self {
            event_id: String::new(),
            kind,
            identifier: identifier.to_string(),
            author_pubkey: author_pubkey.to_string(),
            target_kind,
            authorized_pubkeys: authorized,
            created_at: 0,
        }
    }

    /// Interprets a raw pointer event. A missing or unparsable `k` tag
    /// means `default_target_kind`; `p` values that are not hex pubkeys are
    /// dropped.
    pub fn from_event(event: &NostrEvent, default_target_kind: u16) -> Self {
        let target_kind = event
            .tag_value(TAG_TARGET_KIND)
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(default_target_kind);

        let mut authorized = Vec::new();
        for tag in event.tags.iter().filter(|tag| tag.name == TAG_AUTHOR) {
            match tag.first_value() {
                Some(pubkey) if is_hex_pubkey(pubkey) => {
                    push_unique(&mut authorized, &pubkey.to_lowercase());
                }
                value => warn!(
                    pointer = %event.event_id,
                    value = value.unwrap_or_default(),
                    "Dropping malformed author tag"
                ),
            }
        }
        if !authorized.contains(&event.pubkey) {
            authorized.insert(0, event.pubkey.clone());
        }

        Self {
            event_id: event.event_id.clone(),
            kind: event.kind,
            identifier: event.identifier().unwrap_or_default().to_string(),
            author_pubkey: event.pubkey.clone(),
            target_kind,
            authorized_pubkeys: authorized,
            created_at: event.created_at,
        }
    }

    pub fn is_authorized(&self, pubkey: &str) -> bool {
        self.authorized_pubkeys.iter().any(|p| p == pubkey)
    }

    /// `["d", id]`, `["k", target]`, then one `["p", pubkey]` per author.
    pub fn to_draft(&self, created_at: u64) -> EventDraft {
        let mut draft = EventDraft::new(self.kind);
        draft.created_at = created_at;
        draft.push_tag(d_tag(&self.identifier));
        draft.push_tag(k_tag(self.target_kind));
        for pubkey in &self.authorized_pubkeys {
            draft.push_tag(p_tag(pubkey));
        }
        draft
    }

    /// NIP-01 coordinate, used as the back-reference on target events.
    pub fn coordinate(&self) -> String {
        coordinate(self.kind, &self.author_pubkey, &self.identifier)
    }

    pub fn address(&self, relays: Vec<String>) -> AddressPointer {
        AddressPointer::new(self.kind, self.author_pubkey.clone(), self.identifier.clone())
            .with_relays(relays)
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

/// Newest first; equal timestamps order by ascending event id.
pub fn recency(a: &NostrEvent, b: &NostrEvent) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.event_id.cmp(&b.event_id))
}

/// The winning record, independent of input order.
pub fn select_newest(events: &[NostrEvent]) -> Option<&NostrEvent> {
    events.iter().min_by(|a, b| recency(a, b))
}

/// Queries pointers at `address` and returns the newest.
pub async fn resolve_pointer(
    transport: &dyn RelayTransport,
    address: &AddressPointer,
    default_target_kind: u16,
) -> Result<PointerRecord, Error> {
    let filter = RecordFilter::new(address.kind)
        .authors([address.pubkey.clone()])
        .identifier(address.identifier.clone());

    let mut events = transport.query(filter.clone()).await?;
    events.retain(|event| filter.matches(event));
    debug!(
        coordinate = %address.coordinate(),
        candidates = events.len(),
        "Resolving pointer"
    );

    let newest = select_newest(&events).ok_or_else(|| Error::PointerNotFound {
        kind: address.kind,
        pubkey: address.pubkey.clone(),
        identifier: address.identifier.clone(),
    })?;

    Ok(PointerRecord::from_event(newest, default_target_kind))
}

/// Broadcasts a signed pointer as itself. Distinct from target publishing,
/// which goes through a kind adapter.
pub async fn publish_pointer(
    transport: &dyn RelayTransport,
    event: &NostrEvent,
) -> Result<PublishResult, Error> {
    transport.publish_append(event).await
}
