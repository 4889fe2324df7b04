use std::time::{SystemTime, UNIX_EPOCH};

use nostr_sdk::prelude::*;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Collaborative pointer (NIP-C1).
pub const KIND_COLLAB_POINTER: u16 = 39382;
pub const KIND_ARTICLE: u16 = 30023;
pub const KIND_WIKI: u16 = 30818;
pub const KIND_VERSIONED_ARTICLE: u16 = 3023;

pub const TAG_IDENTIFIER: &str = "d";
pub const TAG_TARGET_KIND: &str = "k";
pub const TAG_AUTHOR: &str = "p";
pub const TAG_ADDRESS: &str = "a";
pub const TAG_TITLE: &str = "title";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NostrTag {
    pub name: String,
    pub values: Vec<String>,
}

impl NostrTag {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Builds a tag from its flat wire form; `None` for an empty array.
    pub fn from_parts(parts: Vec<String>) -> Option<Self> {
        let mut iter = parts.into_iter();
        let name = iter.next()?;
        Some(Self {
            name,
            values: iter.collect(),
        })
    }

    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(|s| s.as_str())
    }

    pub fn to_parts(&self) -> Vec<String> {
        let mut parts = Vec::with_capacity(1 + self.values.len());
        parts.push(self.name.clone());
        parts.extend(self.values.iter().cloned());
        parts
    }

    pub fn to_sdk_tag(&self) -> Result<Tag, Error> {
        Ok(Tag::parse(self.to_parts())?)
    }

    pub fn from_sdk_tag(tag: &Tag) -> Self {
        let parts = tag.clone().to_vec();
        let name = parts.first().cloned().unwrap_or_default();
        let values = parts.into_iter().skip(1).collect();
        Self { name, values }
    }
}

/// A signed record as returned by a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NostrEvent {
    pub event_id: String,
    pub kind: u16,
    pub pubkey: String,
    pub created_at: u64,
    pub content: String,
    pub tags: Vec<NostrTag>,
    pub raw_json: String,
}

impl NostrEvent {
    pub fn from_event(event: &Event) -> Self {
        let tags = event
            .tags
            .iter()
            .map(NostrTag::from_sdk_tag)
            .collect();

        Self {
            event_id: event.id.to_string(),
            kind: event.kind.as_u16(),
            pubkey: event.pubkey.to_string(),
            created_at: event.created_at.as_secs(),
            content: event.content.clone(),
            tags,
            raw_json: event.as_json(),
        }
    }

    pub fn tag_value(&self, name: &str) -> Option<&str> {
        tag_value(&self.tags, name)
    }

    pub fn identifier(&self) -> Option<&str> {
        self.tag_value(TAG_IDENTIFIER)
    }

    /// Tags as flat string arrays, the shape used on the wire.
    pub fn tag_arrays(&self) -> Vec<Vec<String>> {
        self.tags.iter().map(NostrTag::to_parts).collect()
    }
}

/// An unsigned event under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub kind: u16,
    pub content: String,
    pub tags: Vec<NostrTag>,
    pub created_at: u64,
}

impl EventDraft {
    pub fn new(kind: u16) -> Self {
        Self {
            kind,
            content: String::new(),
            tags: Vec::new(),
            created_at: unix_timestamp(),
        }
    }

    pub fn tag_value(&self, name: &str) -> Option<&str> {
        tag_value(&self.tags, name)
    }

    pub fn push_tag(&mut self, tag: NostrTag) {
        self.tags.push(tag);
    }

    pub fn remove_tags(&mut self, name: &str) {
        self.tags.retain(|tag| tag.name != name);
    }

    /// Replaces every tag called `name` with a single `[name, value]`.
    pub fn set_tag(&mut self, name: &str, value: &str) {
        self.remove_tags(name);
        self.tags
            .push(NostrTag::new(name, vec![value.to_string()]));
    }
}

pub fn d_tag(id: &str) -> NostrTag {
    NostrTag::new(TAG_IDENTIFIER, vec![id.to_string()])
}

pub fn k_tag(kind: u16) -> NostrTag {
    NostrTag::new(TAG_TARGET_KIND, vec![kind.to_string()])
}

pub fn p_tag(pubkey: &str) -> NostrTag {
    NostrTag::new(TAG_AUTHOR, vec![pubkey.to_string()])
}

pub fn a_tag(coordinate: &str) -> NostrTag {
    NostrTag::new(TAG_ADDRESS, vec![coordinate.to_string()])
}

pub fn title_tag(title: &str) -> NostrTag {
    NostrTag::new(TAG_TITLE, vec![title.to_string()])
}

pub fn tag_value<'a>(tags: &'a [NostrTag], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|tag| tag.name == name)
        .and_then(|tag| tag.first_value())
}

/// `kind:pubkey:identifier`, the NIP-01 coordinate of an addressable event.
pub fn coordinate(kind: u16, pubkey: &str, identifier: &str) -> String {
    format!("{kind}:{pubkey}:{identifier}")
}

/// NIP-01 event id over `[0, pubkey, created_at, kind, tags, content]`.
pub fn compute_event_id(
    pubkey: &str,
    created_at: u64,
    kind: u16,
    tags: &[NostrTag],
    content: &str,
) -> Result<String, Error> {
    let public_key = PublicKey::from_hex(pubkey)?;
    let tags = tags
        .iter()
        .map(NostrTag::to_sdk_tag)
        .collect::<Result<Vec<_>, _>>()?;
    let tags = Tags::from_list(tags);
    let id = EventId::new(
        &public_key,
        &Timestamp::from(created_at),
        &Kind::from(kind),
        &tags,
        content,
    );
    Ok(id.to_hex())
}

pub fn is_hex_pubkey(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
