//! Collaborative documents on Nostr (NIP-C1).
//!
//! A *pointer* event names the public keys allowed to publish versions of a
//! *target* document, identified by an event kind and a stable `d` slug.
//! Any authorized author may publish; readers query every relay and converge
//! on the newest authorized version.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         NOSTR-COLLAB                              │
//! │                                                                   │
//! │  ┌──────────────────────┐                                         │
//! │  │  DocumentProtocol    │  create / fetch / update / history      │
//! │  └───┬─────────┬────────┘  set_authors / list_documents           │
//! │      │         │                                                  │
//! │      ▼         ▼                                                  │
//! │  resolve_pointer   AdapterRegistry ── Article / Wiki / Versioned  │
//! │      │                    │            / Generic                  │
//! │      ▼                    ▼                                       │
//! │  RelayTransport  ◄──── KindAdapter::publish                       │
//! │  (NostrRelayClient | MemoryRelay)                                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Event Kinds
//!
//! | Kind | Constant | Purpose | Replaceable |
//! |------|----------|---------|-------------|
//! | 39382 | `KIND_COLLAB_POINTER` | Collaborative pointer | yes |
//! | 30023 | `KIND_ARTICLE` | Long-form article | yes |
//! | 30818 | `KIND_WIKI` | Wiki page | yes |
//! | 3023 | `KIND_VERSIONED_ARTICLE` | Versioned article | no |
//!
//! Any other kind is handled by [`GenericAdapter`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nostr_collab::{
//!     CollabConfig, CreateRequest, DocumentProtocol, FieldTemplate, HttpNip05Lookup,
//!     IdentifierResolver, KeysSigner, NostrRelayClient, KIND_ARTICLE,
//! };
//!
//! let config = CollabConfig::from_env()?;
//! let transport = Arc::new(NostrRelayClient::new(&config).await?);
//! let resolver = IdentifierResolver::new(Arc::new(HttpNip05Lookup::new(config.timeout)?));
//! let signer = Arc::new(KeysSigner::parse("nsec1...")?);
//!
//! let protocol = DocumentProtocol::new(config, transport, resolver).with_signer(signer);
//! let fields = FieldTemplate::new().with("title", "Notes").with("content", "# Hello");
//! let outcome = protocol
//!     .create(CreateRequest::new(KIND_ARTICLE, fields).collaborators(["bob@example.com"]))
//!     .await?;
//! println!("{}", outcome.naddr);
//! ```

mod address;
mod adapters;
mod config;
mod document;
mod error;
mod events;
mod kinds;
pub mod mock;
mod pointer;
mod relays;
mod resolve;
mod transport;

pub use adapters::{
    AdapterRegistry, ArticleAdapter, FieldTemplate, GenericAdapter, KindAdapter,
    VersionedArticleAdapter, WikiAdapter,
};
pub use address::{decode_naddr, decode_npub, encode_naddr, encode_npub, AddressPointer};
pub use config::{parse_relays, CollabConfig, DEFAULT_RELAYS};
pub use document::{
    generate_doc_id, stamp_back_reference, AuthorsOutcome, Clock, CreateOutcome, CreateRequest,
    DocumentProtocol, DocumentSummary, DocumentVersion, PublishedEvent, ResolvedDocument,
    SkippedCollaborator,
};
pub use error::Error;
pub use events::{
    a_tag, compute_event_id, coordinate, d_tag, k_tag, p_tag, tag_value, title_tag,
    unix_timestamp, EventDraft, NostrEvent, NostrTag, KIND_ARTICLE, KIND_COLLAB_POINTER,
    KIND_VERSIONED_ARTICLE, KIND_WIKI, TAG_ADDRESS, TAG_AUTHOR, TAG_IDENTIFIER, TAG_TARGET_KIND,
    TAG_TITLE,
};
pub use kinds::{
    is_addressable_kind, is_ephemeral_kind, is_replaceable_kind, kind_label, SuggestedKind,
    SUGGESTED_KINDS,
};
pub use pointer::{publish_pointer, resolve_pointer, select_newest, PointerRecord};
pub use relays::{normalize_relay_url, RelayStore};
pub use resolve::{CachedNip05Lookup, HttpNip05Lookup, IdentifierResolver, Nip05Lookup};
pub use transport::{
    KeysSigner, NostrRelayClient, PublishMode, PublishResult, RecordFilter, RelayTransport,
    Signer,
};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
