//! Kind adapters: one strategy per target kind, plus a generic fallback.
//!
//! An adapter turns a free-form [`FieldTemplate`] into an unsigned target
//! event, projects title and content back out of a signed one, and decides
//! whether a publish replaces the previous version or is retained alongside
//! it.

mod article;
mod generic;
mod versioned;
mod wiki;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::events::{d_tag, title_tag, EventDraft, NostrEvent, NostrTag, TAG_IDENTIFIER, TAG_TITLE};
use crate::kinds::kind_label;
use crate::transport::{PublishResult, RelayTransport};
use crate::Error;

pub use article::ArticleAdapter;
pub use generic::GenericAdapter;
pub use versioned::VersionedArticleAdapter;
pub use wiki::WikiAdapter;

pub(crate) const UNTITLED: &str = "Untitled";

const FIELD_CONTENT: &str = "content";
const FIELD_TITLE: &str = "title";
const FIELD_TAGS: &str = "tags";

/// Caller-supplied fields for building or updating a target event.
///
/// Recognized keys are `content`, `title` and `tags`. `tags` is an array of
/// string arrays, or a JSON string holding one; anything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldTemplate(Map<String, Value>);

impl FieldTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-object values yield an empty template.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, Error> {
        Ok(Self::from_value(serde_json::from_str(raw)?))
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn content(&self) -> Option<&str> {
        self.get_str(FIELD_CONTENT)
    }

    /// The `title` field, else the first `["title", ..]` entry in `tags`.
    pub fn title(&self) -> Option<String> {
        if let Some(title) = self.get_str(FIELD_TITLE) {
            return Some(title.to_string());
        }
        self.raw_tags()
            .into_iter()
            .find(|tag| tag.name == TAG_TITLE)
            .and_then(|tag| tag.first_value().map(str::to_string))
    }

    /// Auxiliary tags, minus `d` (owned by the protocol) and `title`.
    pub fn extra_tags(&self) -> Vec<NostrTag> {
        self.raw_tags()
            .into_iter()
            .filter(|tag| tag.name != TAG_IDENTIFIER && tag.name != TAG_TITLE)
            .collect()
    }

    fn raw_tags(&self) -> Vec<NostrTag> {
        match self.0.get(FIELD_TAGS) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(parsed) => parse_tag_arrays(&parsed),
                Err(err) => {
                    debug!(error = %err, "Ignoring tags field that is not JSON");
                    Vec::new()
                }
            },
            Some(value) => parse_tag_arrays(value),
        }
    }
}

/// Keeps non-empty arrays made only of strings; drops everything else.
fn parse_tag_arrays(value: &Value) -> Vec<NostrTag> {
    let Some(entries) = value.as_array() else {
        debug!("Ignoring tags field that is not an array");
        return Vec::new();
    };

    let mut tags = Vec::with_capacity(entries.len());
    for entry in entries {
        let parts: Option<Vec<String>> = entry
            .as_array()
            .and_then(|items| items.iter().map(|v| v.as_str().map(str::to_string)).collect());
        match parts.and_then(NostrTag::from_parts) {
            Some(tag) => tags.push(tag),
            None => debug!(entry = %entry, "Dropping malformed tag entry"),
        }
    }
    tags
}

/// Strategy for one target kind.
#[async_trait]
pub trait KindAdapter: Send + Sync {
    fn kind(&self) -> u16;

    fn label(&self) -> String {
        kind_label(self.kind())
    }

    /// `true`: a publish supersedes the previous version for the same
    /// author and identifier. `false`: every publish is retained.
    fn is_replaceable(&self) -> bool;

    /// Never fails; falls back to placeholder text.
    fn title(&self, event: &NostrEvent) -> String;

    fn content(&self, event: &NostrEvent) -> String {
        event.content.clone()
    }

    /// A new unsigned event; always carries the `d` identifier.
    fn build(&self, identifier: &str, fields: &FieldTemplate) -> EventDraft;

    /// Replaces title and content when supplied; appends auxiliary tags.
    fn apply_update(&self, draft: &mut EventDraft, fields: &FieldTemplate) {
        apply_common(draft, fields);
    }

    async fn publish(
        &self,
        event: &NostrEvent,
        transport: &dyn RelayTransport,
    ) -> Result<PublishResult, Error> {
        if self.is_replaceable() {
            transport.publish_replaceable(event).await
        } else {
            transport.publish_append(event).await
        }
    }
}

/// Draft with `d`, content and auxiliary tags; `title` left to the caller.
pub(crate) fn base_draft(kind: u16, identifier: &str, fields: &FieldTemplate) -> EventDraft {
    let mut draft = EventDraft::new(kind);
    draft.push_tag(d_tag(identifier));
    draft.content = fields.content().unwrap_or_default().to_string();
    draft.tags.extend(fields.extra_tags());
    draft
}

pub(crate) fn apply_common(draft: &mut EventDraft, fields: &FieldTemplate) {
    if let Some(title) = fields.title() {
        draft.remove_tags(TAG_TITLE);
        draft.push_tag(title_tag(&title));
    }
    if let Some(content) = fields.content() {
        draft.content = content.to_string();
    }
    draft.tags.extend(fields.extra_tags());
}

/// Adapters keyed by kind. Unknown kinds get a [`GenericAdapter`].
pub struct AdapterRegistry {
    adapters: HashMap<u16, Arc<dyn KindAdapter>>,
}

impl AdapterRegistry {
    /// A registry with no adapters; every lookup falls back to generic.
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Article, wiki and versioned article registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(ArticleAdapter);
        registry.register(WikiAdapter);
        registry.register(VersionedArticleAdapter);
        registry
    }

    /// Replaces any adapter already registered for the same kind.
    pub fn register<A: KindAdapter + 'static>(&mut self, adapter: A) {
        self.register_arc(Arc::new(adapter));
    }

    pub fn register_arc(&mut self, adapter: Arc<dyn KindAdapter>) {
        let kind = adapter.kind();
        info!(kind, label = %adapter.label(), "Registering kind adapter");
        self.adapters.insert(kind, adapter);
    }

    pub fn lookup(&self, kind: u16) -> Arc<dyn KindAdapter> {
        match self.adapters.get(&kind) {
            Some(adapter) => adapter.clone(),
            None => Arc::new(GenericAdapter::new(kind)),
        }
    }

    pub fn has_adapter(&self, kind: u16) -> bool {
        self.adapters.contains_key(&kind)
    }

    /// Registered kinds, ascending.
    pub fn kinds(&self) -> Vec<u16> {
        let mut kinds: Vec<u16> = self.adapters.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
