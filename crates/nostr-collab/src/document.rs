//! Create, fetch and update collaborative documents.
//!
//! Every operation re-resolves from the relays; nothing is cached between
//! calls. Sign and publish steps run sequentially and any failure aborts the
//! operation.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use rand_core::{OsRng, RngCore};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::adapters::{AdapterRegistry, FieldTemplate, KindAdapter};
use crate::address::AddressPointer;
use crate::config::CollabConfig;
use crate::events::{a_tag, unix_timestamp, EventDraft, NostrEvent, TAG_ADDRESS};
use crate::kinds::kind_label;
use crate::pointer::{publish_pointer, recency, resolve_pointer, select_newest, PointerRecord};
use crate::resolve::IdentifierResolver;
use crate::transport::{PublishResult, RecordFilter, RelayTransport, Signer};
use crate::Error;

const DOC_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const DOC_ID_GROUP_LEN: usize = 4;

/// Source of `created_at` timestamps.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub target_kind: u16,
    /// Generated (`doc-xxxx-xxxx`) when absent.
    pub identifier: Option<String>,
    /// Hex pubkeys, `npub`s or NIP-05 identifiers.
    pub collaborators: Vec<String>,
    pub fields: FieldTemplate,
}

impl CreateRequest {
    pub fn new(target_kind: u16, fields: FieldTemplate) -> Self {
        Self {
            target_kind,
            identifier: None,
            collaborators: Vec::new(),
            fields,
        }
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn collaborators<I, S>(mut self, collaborators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collaborators = collaborators.into_iter().map(Into::into).collect();
        self
    }
}

/// A collaborator input that did not resolve; creation went ahead without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCollaborator {
    pub input: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event: NostrEvent,
    pub result: PublishResult,
}

#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub address: AddressPointer,
    pub naddr: String,
    pub pointer: PointerRecord,
    pub target: PublishedEvent,
    pub skipped: Vec<SkippedCollaborator>,
}

#[derive(Debug, Clone)]
pub struct AuthorsOutcome {
    pub pointer: PointerRecord,
    pub skipped: Vec<SkippedCollaborator>,
}

/// One target event projected through its kind adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentVersion {
    pub event_id: String,
    pub kind: u16,
    pub author: String,
    pub title: String,
    pub content: String,
    pub created_at: u64,
    pub tags: Vec<Vec<String>>,
}

impl DocumentVersion {
    pub fn from_event(adapter: &dyn KindAdapter, event: &NostrEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            kind: event.kind,
            author: event.pubkey.clone(),
            title: adapter.title(event),
            content: adapter.content(event),
            created_at: event.created_at,
            tags: event.tag_arrays(),
        }
    }
}

/// A pointer plus its current version; `current` is `None` when nothing has
/// been published yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDocument {
    pub pointer: PointerRecord,
    pub kind_label: String,
    pub current: Option<DocumentVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub naddr: String,
    pub identifier: String,
    pub target_kind: u16,
    pub kind_label: String,
    pub title: Option<String>,
    pub authors: usize,
    /// Newest target event, else the pointer itself.
    pub updated_at: u64,
}

/// Entry point for the collaborative document operations.
#[derive(Clone)]
pub struct DocumentProtocol {
    config: CollabConfig,
    transport: Arc<dyn RelayTransport>,
    signer: Option<Arc<dyn Signer>>,
    resolver: IdentifierResolver,
    registry: Arc<AdapterRegistry>,
    clock: Clock,
}

impl DocumentProtocol {
    pub fn new(
        config: CollabConfig,
        transport: Arc<dyn RelayTransport>,
        resolver: IdentifierResolver,
    ) -> Self {
        Self {
            config,
            transport,
            signer: None,
            resolver,
            registry: Arc::new(AdapterRegistry::new()),
            clock: Arc::new(unix_timestamp),
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &CollabConfig {
        &self.config
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub async fn create(&self, request: CreateRequest) -> Result<CreateOutcome, Error> {
        let (signer, me) = self.acting_identity().await?;
        let identifier = request.identifier.clone().unwrap_or_else(generate_doc_id);
        let (collaborators, skipped) = self.resolve_collaborators(&request.collaborators).await;

        let record = PointerRecord::new(
            self.config.pointer_kind,
            &me,
            &identifier,
            request.target_kind,
            &collaborators,
        );
        // Nothing is published for a document that has no valid address.
        let address = record.address(self.config.hint_relays());
        let naddr = address.to_naddr()?;

        let now = self.now();
        let pointer_event = self.sign(&signer, record.to_draft(now)).await?;
        self.bounded(publish_pointer(self.transport.as_ref(), &pointer_event))
            .await?;
        let pointer = PointerRecord::from_event(&pointer_event, self.config.default_target_kind);

        let adapter = self.registry.lookup(pointer.target_kind);
        let mut draft = adapter.build(&identifier, &request.fields);
        draft.created_at = now;
        stamp_back_reference(&mut draft, &pointer);
        let target = self.sign_and_publish(&signer, adapter.as_ref(), draft).await?;

        info!(
            identifier = %identifier,
            target_kind = pointer.target_kind,
            authors = pointer.authorized_pubkeys.len(),
            skipped = skipped.len(),
            "Created collaborative document"
        );

        Ok(CreateOutcome {
            address,
            naddr,
            pointer,
            target,
            skipped,
        })
    }

    pub async fn fetch(&self, address: &AddressPointer) -> Result<ResolvedDocument, Error> {
        let pointer = self.resolve(address).await?;
        let adapter = self.registry.lookup(pointer.target_kind);
        let events = self.target_events(&pointer).await?;

        let current = select_newest(&events).map(|event| DocumentVersion::from_event(adapter.as_ref(), event));
        Ok(ResolvedDocument {
            kind_label: adapter.label(),
            pointer,
            current,
        })
    }

    /// Every valid version, newest first.
    pub async fn history(&self, address: &AddressPointer) -> Result<Vec<DocumentVersion>, Error> {
        let pointer = self.resolve(address).await?;
        let adapter = self.registry.lookup(pointer.target_kind);
        let events = self.target_events(&pointer).await?;

        Ok(events
            .iter()
            .map(|event| DocumentVersion::from_event(adapter.as_ref(), event))
            .collect())
    }

    /// Publishes a new version built only from `fields`.
    pub async fn update(
        &self,
        address: &AddressPointer,
        fields: &FieldTemplate,
    ) -> Result<PublishedEvent, Error> {
        let (signer, me) = self.acting_identity().await?;
        let pointer = self.resolve(address).await?;

        if !pointer.is_authorized(&me) {
            return Err(Error::Forbidden {
                pubkey: me,
                authorized: pointer.authorized_pubkeys,
            });
        }

        let adapter = self.registry.lookup(pointer.target_kind);
        let mut draft = adapter.build(&pointer.identifier, fields);
        draft.created_at = self.now();
        stamp_back_reference(&mut draft, &pointer);

        let published = self.sign_and_publish(&signer, adapter.as_ref(), draft).await?;
        info!(
            identifier = %pointer.identifier,
            event_id = %published.event.event_id,
            "Updated collaborative document"
        );
        Ok(published)
    }

    /// Re-publishes the pointer with a new author set. Only the pointer's
    /// publisher may do this.
    pub async fn set_authors(
        &self,
        address: &AddressPointer,
        collaborators: &[String],
    ) -> Result<AuthorsOutcome, Error> {
        let (signer, me) = self.acting_identity().await?;
        let current = self.resolve(address).await?;

        if current.author_pubkey != me {
            return Err(Error::Forbidden {
                pubkey: me,
                authorized: vec![current.author_pubkey],
            });
        }

        let (resolved, skipped) = self.resolve_collaborators(collaborators).await;
        let record = PointerRecord::new(
            current.kind,
            &me,
            &current.identifier,
            current.target_kind,
            &resolved,
        );
        // Must sort after the pointer it supersedes.
        let created_at = self.now().max(current.created_at.saturating_add(1));
        let event = self.sign(&signer, record.to_draft(created_at)).await?;
        self.bounded(publish_pointer(self.transport.as_ref(), &event))
            .await?;

        let pointer = PointerRecord::from_event(&event, self.config.default_target_kind);
        info!(
            identifier = %pointer.identifier,
            authors = pointer.authorized_pubkeys.len(),
            "Updated document authors"
        );
        Ok(AuthorsOutcome { pointer, skipped })
    }

    /// Documents whose pointer `pubkey` published, most recently updated first.
    pub async fn list_documents(&self, pubkey: &str) -> Result<Vec<DocumentSummary>, Error> {
        let pubkey = self.resolver.resolve(pubkey).await?;
        let filter = RecordFilter::new(self.config.pointer_kind).authors([pubkey.clone()]);
        let mut events = self.bounded(self.transport.query(filter.clone())).await?;
        events.retain(|event| filter.matches(event) && event.identifier().is_some());
        events.sort_by(recency);

        let mut seen = HashSet::new();
        let mut summaries = Vec::new();
        for event in &events {
            let pointer = PointerRecord::from_event(event, self.config.default_target_kind);
            if !seen.insert(pointer.identifier.clone()) {
                continue;
            }

            let adapter = self.registry.lookup(pointer.target_kind);
            let targets = self.target_events(&pointer).await?;
            let current = select_newest(&targets);

            summaries.push(DocumentSummary {
                naddr: pointer.address(self.config.hint_relays()).to_naddr()?,
                identifier: pointer.identifier.clone(),
                target_kind: pointer.target_kind,
                kind_label: kind_label(pointer.target_kind),
                title: current.map(|event| adapter.title(event)),
                authors: pointer.authorized_pubkeys.len(),
                updated_at: current.map_or(pointer.created_at, |event| event.created_at),
            });
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        debug!(pubkey = %pubkey, documents = summaries.len(), "Listed documents");
        Ok(summaries)
    }

    async fn resolve(&self, address: &AddressPointer) -> Result<PointerRecord, Error> {
        self.bounded(resolve_pointer(
            self.transport.as_ref(),
            address,
            self.config.default_target_kind,
        ))
        .await
    }

    /// Target events by authorized authors, re-checked and newest first.
    async fn target_events(&self, pointer: &PointerRecord) -> Result<Vec<NostrEvent>, Error> {
        let filter = RecordFilter::new(pointer.target_kind)
            .authors(pointer.authorized_pubkeys.iter().cloned())
            .identifier(pointer.identifier.clone());

        let mut events = self.bounded(self.transport.query(filter.clone())).await?;
        let fetched = events.len();
        events.retain(|event| filter.matches(event));
        events.sort_by(recency);
        events.dedup_by(|a, b| a.event_id == b.event_id);

        debug!(
            identifier = %pointer.identifier,
            fetched,
            valid = events.len(),
            "Fetched target events"
        );
        Ok(events)
    }

    async fn acting_identity(&self) -> Result<(Arc<dyn Signer>, String), Error> {
        let signer = self.signer.clone().ok_or(Error::Unauthenticated)?;
        let pubkey = self.bounded(signer.public_key()).await?;
        Ok((signer, pubkey))
    }

    async fn sign(&self, signer: &Arc<dyn Signer>, draft: EventDraft) -> Result<NostrEvent, Error> {
        self.bounded(signer.sign(draft)).await
    }

    async fn sign_and_publish(
        &self,
        signer: &Arc<dyn Signer>,
        adapter: &dyn KindAdapter,
        draft: EventDraft,
    ) -> Result<PublishedEvent, Error> {
        let event = self.sign(signer, draft).await?;
        let result = self
            .bounded(adapter.publish(&event, self.transport.as_ref()))
            .await?;
        Ok(PublishedEvent { event, result })
    }

    /// Resolves each input independently; failures are collected, not fatal.
    async fn resolve_collaborators(&self, inputs: &[String]) -> (Vec<String>, Vec<SkippedCollaborator>) {
        let mut tasks = JoinSet::new();
        for (index, input) in inputs.iter().enumerate() {
            let resolver = self.resolver.clone();
            let input = input.clone();
            let timeout = self.config.timeout;
            tasks.spawn(async move {
                let result = match tokio::time::timeout(timeout, resolver.resolve(&input)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<String, Error>>> =
            inputs.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(slot) = results.get_mut(index) {
                        *slot = Some(result);
                    }
                }
                Err(err) => warn!(error = %err, "Collaborator resolution task failed"),
            }
        }

        let mut resolved = Vec::new();
        let mut skipped = Vec::new();
        for (input, result) in inputs.iter().zip(results) {
            let reason = match result {
                Some(Ok(pubkey)) => {
                    resolved.push(pubkey);
                    continue;
                }
                Some(Err(err)) => err.to_string(),
                None => "resolution task failed".to_string(),
            };
            warn!(input = %input, reason = %reason, "Skipping collaborator");
            skipped.push(SkippedCollaborator {
                input: input.clone(),
                reason,
            });
        }
        (resolved, skipped)
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        tokio::time::timeout(self.config.timeout, operation)
            .await
            .map_err(|_| Error::Timeout)?
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }
}

/// Adds `["a", <pointer coordinate>]`, replacing an identical one.
pub fn stamp_back_reference(draft: &mut EventDraft, pointer: &PointerRecord) {
    let coordinate = pointer.coordinate();
    draft
        .tags
        .retain(|tag| !(tag.name == TAG_ADDRESS && tag.first_value() == Some(coordinate.as_str())));
    draft.push_tag(a_tag(&coordinate));
}

/// `doc-xxxx-xxxx` over `[a-z0-9]`.
pub fn generate_doc_id() -> String {
    let group = || -> String {
        (0..DOC_ID_GROUP_LEN)
            .map(|_| {
                let index = (OsRng.next_u32() as usize) % DOC_ID_ALPHABET.len();
                DOC_ID_ALPHABET[index] as char
            })
            .collect()
    };
    let first = group();
    let second = group();
    format!("doc-{first}-{second}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{KIND_ARTICLE, KIND_COLLAB_POINTER};
    use crate::mock::{MemoryRelay, StaticNip05, StaticSigner, SAMPLE_PUBKEYS};
    use crate::resolve::Nip05Lookup;
    use async_trait::async_trait;
    use std::time::Duration;

    fn alice() -> String {
        SAMPLE_PUBKEYS[0].to_string()
    }

    fn bob() -> String {
        SAMPLE_PUBKEYS[1].to_string()
    }

    struct PanickingLookup;

    #[async_trait]
    impl Nip05Lookup for PanickingLookup {
        async fn lookup(&self, identifier: &str) -> Result<Option<String>, Error> {
            panic!("lookup for {identifier} blew up");
        }
    }

    fn protocol(relay: Arc<MemoryRelay>) -> DocumentProtocol {
        let resolver = IdentifierResolver::new(Arc::new(StaticNip05::new()));
        DocumentProtocol::new(CollabConfig::default(), relay, resolver).with_clock(|| 1_000)
    }

    #[test]
    fn doc_ids_have_expected_shape() {
        let id = generate_doc_id();
        assert_eq!(id.len(), 13);
        assert!(id.starts_with("doc-"));
        assert_eq!(&id[8..9], "-");
        assert!(id[4..8]
            .chars()
            .chain(id[9..].chars())
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(generate_doc_id(), generate_doc_id());
    }

    #[test]
    fn back_reference_is_idempotent() {
        let pointer = PointerRecord::new(KIND_COLLAB_POINTER, &alice(), "doc-1", KIND_ARTICLE, &[]);
        let mut draft = EventDraft::new(KIND_ARTICLE);
        stamp_back_reference(&mut draft, &pointer);
        stamp_back_reference(&mut draft, &pointer);

        let refs: Vec<_> = draft.tags.iter().filter(|t| t.name == "a").collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].first_value(), Some(format!("39382:{}:doc-1", alice()).as_str()));
    }

    #[tokio::test]
    async fn create_without_signer_is_unauthenticated() {
        let relay = Arc::new(MemoryRelay::new());
        let err = protocol(relay.clone())
            .create(CreateRequest::new(KIND_ARTICLE, FieldTemplate::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
        assert!(relay.publishes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_skips_unresolvable_collaborators() {
        let relay = Arc::new(MemoryRelay::new());
        let protocol = protocol(relay.clone()).with_signer(Arc::new(StaticSigner::new(alice())));

        let outcome = protocol
            .create(
                CreateRequest::new(KIND_ARTICLE, FieldTemplate::new().with("title", "T"))
                    .collaborators([bob(), "???".to_string(), "nobody@example.com".to_string()]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.pointer.authorized_pubkeys, vec![alice(), bob()]);
        let skipped: Vec<&str> = outcome.skipped.iter().map(|s| s.input.as_str()).collect();
        assert_eq!(skipped, vec!["???", "nobody@example.com"]);
        assert_eq!(outcome.address.relays.len(), 2);
        assert!(outcome.naddr.starts_with("naddr1"));
    }

    #[tokio::test]
    async fn create_publishes_pointer_then_target() {
        let relay = Arc::new(MemoryRelay::new());
        let protocol = protocol(relay.clone()).with_signer(Arc::new(StaticSigner::new(alice())));

        let outcome = protocol
            .create(CreateRequest::new(KIND_ARTICLE, FieldTemplate::new()).identifier("doc-ab12-cd34"))
            .await
            .unwrap();

        let publishes = relay.publishes().unwrap();
        assert_eq!(publishes.len(), 2);
        assert_eq!(publishes[0].1.kind, KIND_COLLAB_POINTER);
        assert_eq!(publishes[1].1.kind, KIND_ARTICLE);
        assert_eq!(
            publishes[1].1.tag_value("a"),
            Some(outcome.pointer.coordinate().as_str())
        );
        assert_eq!(outcome.pointer.identifier, "doc-ab12-cd34");
    }

    #[tokio::test]
    async fn slow_signer_times_out() {
        let relay = Arc::new(MemoryRelay::new());
        let config = CollabConfig {
            timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let resolver = IdentifierResolver::new(Arc::new(StaticNip05::new()));
        let signer = StaticSigner::new(alice()).with_delay(Duration::from_secs(5));
        let protocol = DocumentProtocol::new(config, relay.clone(), resolver).with_signer(Arc::new(signer));

        let err = protocol
            .create(CreateRequest::new(KIND_ARTICLE, FieldTemplate::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(relay.publishes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_with_oversized_identifier_publishes_nothing() {
        let relay = Arc::new(MemoryRelay::new());
        let protocol = protocol(relay.clone()).with_signer(Arc::new(StaticSigner::new(alice())));

        let err = protocol
            .create(CreateRequest::new(KIND_ARTICLE, FieldTemplate::new()).identifier("x".repeat(300)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedAddress(_)));
        assert!(relay.publishes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn panicking_lookup_is_reported_as_skipped() {
        let relay = Arc::new(MemoryRelay::new());
        let resolver = IdentifierResolver::new(Arc::new(PanickingLookup));
        let protocol = DocumentProtocol::new(CollabConfig::default(), relay, resolver)
            .with_clock(|| 1_000)
            .with_signer(Arc::new(StaticSigner::new(alice())));

        let outcome = protocol
            .create(
                CreateRequest::new(KIND_ARTICLE, FieldTemplate::new())
                    .collaborators([bob(), "boom@example.com".to_string()]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.pointer.authorized_pubkeys, vec![alice(), bob()]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].input, "boom@example.com");
        assert_eq!(outcome.skipped[0].reason, "resolution task failed");
    }

    #[tokio::test]
    async fn set_authors_at_max_timestamp_does_not_overflow() {
        let relay = Arc::new(MemoryRelay::new());
        let resolver = IdentifierResolver::new(Arc::new(StaticNip05::new()));
        let protocol = DocumentProtocol::new(CollabConfig::default(), relay, resolver)
            .with_clock(|| u64::MAX)
            .with_signer(Arc::new(StaticSigner::new(alice())));

        let created = protocol
            .create(CreateRequest::new(KIND_ARTICLE, FieldTemplate::new()).identifier("doc-1"))
            .await
            .unwrap();
        assert_eq!(created.pointer.created_at, u64::MAX);

        let outcome = protocol
            .set_authors(&created.address, &[bob()])
            .await
            .unwrap();
        assert_eq!(outcome.pointer.created_at, u64::MAX);
        assert_eq!(outcome.pointer.authorized_pubkeys, vec![alice(), bob()]);
    }
}
