use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nostr_collab::mock::{MemoryRelay, StaticNip05, StaticSigner, SAMPLE_PUBKEYS};
use nostr_collab::{
    decode_naddr, AdapterRegistry, CollabConfig, CreateRequest, DocumentProtocol, Error,
    EventDraft, FieldTemplate, IdentifierResolver, KindAdapter, NostrEvent, PublishMode,
    KIND_ARTICLE, KIND_VERSIONED_ARTICLE,
};
use serde_json::json;

fn alice() -> String {
    SAMPLE_PUBKEYS[0].to_string()
}

fn bob() -> String {
    SAMPLE_PUBKEYS[1].to_string()
}

fn carol() -> String {
    SAMPLE_PUBKEYS[2].to_string()
}

struct Harness {
    relay: Arc<MemoryRelay>,
    clock: Arc<AtomicU64>,
    base: DocumentProtocol,
}

impl Harness {
    fn new() -> Self {
        let relay = Arc::new(MemoryRelay::new());
        let clock = Arc::new(AtomicU64::new(50));
        let nip05 = StaticNip05::new().with_entry("bob@example.com", &bob());
        let resolver = IdentifierResolver::new(Arc::new(nip05));

        let ticks = clock.clone();
        let base = DocumentProtocol::new(CollabConfig::default(), relay.clone(), resolver)
            .with_clock(move || ticks.load(Ordering::SeqCst));

        Self { relay, clock, base }
    }

    fn at(&self, timestamp: u64) {
        self.clock.store(timestamp, Ordering::SeqCst);
    }

    fn as_user(&self, pubkey: String) -> DocumentProtocol {
        self.base.clone().with_signer(Arc::new(StaticSigner::new(pubkey)))
    }
}

#[tokio::test]
async fn latest_authorized_version_wins() {
    let harness = Harness::new();
    let alice_client = harness.as_user(alice());
    let bob_client = harness.as_user(bob());

    let created = alice_client
        .create(
            CreateRequest::new(
                KIND_ARTICLE,
                FieldTemplate::new().with("title", "Draft").with("content", "v0"),
            )
            .identifier("doc-ab12-cd34")
            .collaborators(["bob@example.com"]),
        )
        .await
        .unwrap();
    assert!(created.skipped.is_empty());
    assert_eq!(created.pointer.authorized_pubkeys, vec![alice(), bob()]);

    let address = decode_naddr(&created.naddr).unwrap();
    assert_eq!(address.identifier, "doc-ab12-cd34");
    assert_eq!(address.pubkey, alice());

    harness.at(100);
    alice_client
        .update(
            &address,
            &FieldTemplate::new().with("title", "Alice's").with("content", "from alice"),
        )
        .await
        .unwrap();

    harness.at(200);
    bob_client
        .update(
            &address,
            &FieldTemplate::new().with("title", "Bob's").with("content", "from bob"),
        )
        .await
        .unwrap();

    let document = harness.base.fetch(&address).await.unwrap();
    let current = document.current.unwrap();
    assert_eq!(current.created_at, 200);
    assert_eq!(current.content, "from bob");
    assert_eq!(current.author, bob());
    assert_eq!(current.title, "Bob's");
    assert_eq!(document.kind_label, "Article");
}

#[tokio::test]
async fn update_requires_authorization() {
    let harness = Harness::new();
    let created = harness
        .as_user(alice())
        .create(CreateRequest::new(KIND_ARTICLE, FieldTemplate::new()).collaborators([bob()]))
        .await
        .unwrap();
    let before = harness.relay.publishes().unwrap().len();

    let err = harness
        .as_user(carol())
        .update(&created.address, &FieldTemplate::new().with("content", "nope"))
        .await
        .unwrap_err();
    match err {
        Error::Forbidden { pubkey, authorized } => {
            assert_eq!(pubkey, carol());
            assert_eq!(authorized, vec![alice(), bob()]);
        }
        other => panic!("expected Forbidden, got {other:?}"),
    }
    assert_eq!(harness.relay.publishes().unwrap().len(), before);

    for user in [alice(), bob()] {
        harness
            .as_user(user)
            .update(&created.address, &FieldTemplate::new().with("content", "ok"))
            .await
            .unwrap();
    }
    assert_eq!(harness.relay.publishes().unwrap().len(), before + 2);
}

#[tokio::test]
async fn update_without_signer_is_unauthenticated() {
    let harness = Harness::new();
    let created = harness
        .as_user(alice())
        .create(CreateRequest::new(KIND_ARTICLE, FieldTemplate::new()))
        .await
        .unwrap();

    let err = harness
        .base
        .update(&created.address, &FieldTemplate::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthenticated));
}

#[tokio::test]
async fn fetch_without_content_is_not_an_error() {
    let harness = Harness::new();
    let alice_client = harness.as_user(alice());
    let created = alice_client
        .create(CreateRequest::new(KIND_ARTICLE, FieldTemplate::new()).identifier("doc-empty"))
        .await
        .unwrap();

    // Drop the initial target event, keep only the pointer.
    let pointer_only = MemoryRelay::new();
    for event in harness.relay.events().unwrap() {
        if event.kind != KIND_ARTICLE {
            pointer_only.insert(event).unwrap();
        }
    }
    let reader = DocumentProtocol::new(
        CollabConfig::default(),
        Arc::new(pointer_only),
        IdentifierResolver::new(Arc::new(StaticNip05::new())),
    );

    let document = reader.fetch(&created.address).await.unwrap();
    assert!(document.current.is_none());
    assert_eq!(document.pointer.identifier, "doc-empty");
}

#[tokio::test]
async fn fetch_unknown_pointer_fails() {
    let harness = Harness::new();
    let address = nostr_collab::AddressPointer::new(39382, alice(), "missing");
    let err = harness.base.fetch(&address).await.unwrap_err();
    assert!(matches!(err, Error::PointerNotFound { .. }));
}

#[tokio::test]
async fn unauthorized_target_events_are_ignored() {
    let harness = Harness::new();
    let created = harness
        .as_user(alice())
        .create(
            CreateRequest::new(KIND_ARTICLE, FieldTemplate::new().with("content", "real"))
                .identifier("doc-1"),
        )
        .await
        .unwrap();

    let mut forged = EventDraft::new(KIND_ARTICLE);
    forged.created_at = 10_000;
    forged.content = "forged".to_string();
    forged.push_tag(nostr_collab::d_tag("doc-1"));
    let forged = nostr_collab::Signer::sign(&StaticSigner::new(carol()), forged)
        .await
        .unwrap();
    harness.relay.insert(forged).unwrap();

    let document = harness.base.fetch(&created.address).await.unwrap();
    assert_eq!(document.current.unwrap().content, "real");
}

#[tokio::test]
async fn versioned_documents_keep_history() {
    let harness = Harness::new();
    let alice_client = harness.as_user(alice());
    let created = alice_client
        .create(
            CreateRequest::new(
                KIND_VERSIONED_ARTICLE,
                FieldTemplate::new().with("title", "v1").with("content", "one"),
            )
            .identifier("doc-history"),
        )
        .await
        .unwrap();

    harness.at(60);
    alice_client
        .update(
            &created.address,
            &FieldTemplate::new().with("title", "v2").with("content", "two"),
        )
        .await
        .unwrap();

    let history = harness.base.history(&created.address).await.unwrap();
    let titles: Vec<&str> = history.iter().map(|v| v.title.as_str()).collect();
    assert_eq!(titles, vec!["v2", "v1"]);

    let modes: Vec<PublishMode> = harness
        .relay
        .publishes()
        .unwrap()
        .into_iter()
        .filter(|(_, event)| event.kind == KIND_VERSIONED_ARTICLE)
        .map(|(mode, _)| mode)
        .collect();
    assert_eq!(modes, vec![PublishMode::Append, PublishMode::Append]);
}

#[tokio::test]
async fn unregistered_kind_uses_generic_adapter() {
    let harness = Harness::new();
    let created = harness
        .as_user(alice())
        .create(
            CreateRequest::new(31337, FieldTemplate::new().with("content", "hello world"))
                .identifier("doc-generic"),
        )
        .await
        .unwrap();

    let document = harness.base.fetch(&created.address).await.unwrap();
    assert_eq!(document.pointer.target_kind, 31337);
    assert_eq!(document.kind_label, "Addressable (31337)");
    assert_eq!(document.current.unwrap().title, "hello world");
}

#[tokio::test]
async fn malformed_template_tags_are_dropped() {
    let harness = Harness::new();
    let created = harness
        .as_user(alice())
        .create(
            CreateRequest::new(
                KIND_ARTICLE,
                FieldTemplate::from_value(json!({"content": "x", "tags": "not-an-array"})),
            )
            .identifier("doc-tags"),
        )
        .await
        .unwrap();

    let tags: Vec<String> = created.target.event.tags.iter().map(|t| t.name.clone()).collect();
    assert_eq!(tags, vec!["d", "title", "a"]);
}

#[tokio::test]
async fn set_authors_revokes_and_grants() {
    let harness = Harness::new();
    let alice_client = harness.as_user(alice());
    let created = alice_client
        .create(CreateRequest::new(KIND_ARTICLE, FieldTemplate::new()).collaborators([bob()]))
        .await
        .unwrap();

    let err = harness
        .as_user(bob())
        .set_authors(&created.address, &[carol()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden { .. }));

    // Same clock value as the original pointer; the new one must still win.
    let outcome = alice_client
        .set_authors(&created.address, &[carol(), "???".to_string()])
        .await
        .unwrap();
    assert_eq!(outcome.pointer.authorized_pubkeys, vec![alice(), carol()]);
    assert_eq!(outcome.skipped.len(), 1);

    let err = harness
        .as_user(bob())
        .update(&created.address, &FieldTemplate::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden { .. }));

    harness
        .as_user(carol())
        .update(&created.address, &FieldTemplate::new().with("content", "carol"))
        .await
        .unwrap();
}

#[tokio::test]
async fn list_documents_newest_first() {
    let harness = Harness::new();
    let alice_client = harness.as_user(alice());

    alice_client
        .create(
            CreateRequest::new(KIND_ARTICLE, FieldTemplate::new().with("title", "Older"))
                .identifier("doc-old"),
        )
        .await
        .unwrap();
    harness.at(500);
    alice_client
        .create(
            CreateRequest::new(KIND_ARTICLE, FieldTemplate::new().with("title", "Newer"))
                .identifier("doc-new"),
        )
        .await
        .unwrap();

    let documents = harness.base.list_documents(&alice()).await.unwrap();
    let titles: Vec<Option<&str>> = documents.iter().map(|d| d.title.as_deref()).collect();
    assert_eq!(titles, vec![Some("Newer"), Some("Older")]);
    assert!(documents.iter().all(|d| d.naddr.starts_with("naddr1")));
}

struct UppercaseArticle;

impl KindAdapter for UppercaseArticle {
    fn kind(&self) -> u16 {
        KIND_ARTICLE
    }

    fn is_replaceable(&self) -> bool {
        true
    }

    fn title(&self, event: &NostrEvent) -> String {
        event.content.to_uppercase()
    }

    fn build(&self, identifier: &str, fields: &FieldTemplate) -> EventDraft {
        let mut draft = EventDraft::new(KIND_ARTICLE);
        draft.push_tag(nostr_collab::d_tag(identifier));
        draft.content = fields.content().unwrap_or_default().to_string();
        draft
    }
}

#[tokio::test]
async fn custom_adapter_overrides_builtin() {
    let harness = Harness::new();
    let mut registry = AdapterRegistry::new();
    registry.register(UppercaseArticle);
    let client = harness.as_user(alice()).with_registry(registry);

    let created = client
        .create(CreateRequest::new(KIND_ARTICLE, FieldTemplate::new().with("content", "shout")))
        .await
        .unwrap();

    let document = client.fetch(&created.address).await.unwrap();
    assert_eq!(document.current.unwrap().title, "SHOUT");
}
