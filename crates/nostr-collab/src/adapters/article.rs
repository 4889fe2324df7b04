use crate::events::{title_tag, EventDraft, NostrEvent, KIND_ARTICLE, TAG_TITLE};

use super::{base_draft, FieldTemplate, KindAdapter, UNTITLED};

/// Long-form article (NIP-23, kind 30023). Replaceable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArticleAdapter;

impl KindAdapter for ArticleAdapter {
    fn kind(&self) -> u16 {
        KIND_ARTICLE
    }

    fn label(&self) -> String {
        "Article".to_string()
    }

    fn is_replaceable(&self) -> bool {
        true
    }

    fn title(&self, event: &NostrEvent) -> String {
        event
            .tag_value(TAG_TITLE)
            .filter(|title| !title.is_empty())
            .unwrap_or(UNTITLED)
            .to_string()
    }

    fn build(&self, identifier: &str, fields: &FieldTemplate) -> EventDraft {
        let mut draft = base_draft(KIND_ARTICLE, identifier, fields);
        draft.push_tag(title_tag(&fields.title().unwrap_or_default()));
        draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signed(draft: EventDraft) -> NostrEvent {
        NostrEvent {
            event_id: "id".to_string(),
            kind: draft.kind,
            pubkey: "a".repeat(64),
            created_at: draft.created_at,
            content: draft.content,
            tags: draft.tags,
            raw_json: "{}".to_string(),
        }
    }

    #[test]
    fn build_stamps_identifier_and_title() {
        let fields = FieldTemplate::new()
            .with("title", "Hello")
            .with("content", "# Body");
        let draft = ArticleAdapter.build("doc-ab12-cd34", &fields);

        assert_eq!(draft.kind, KIND_ARTICLE);
        assert_eq!(draft.tag_value("d"), Some("doc-ab12-cd34"));
        assert_eq!(draft.tag_value("title"), Some("Hello"));
        assert_eq!(draft.content, "# Body");
    }

    #[test]
    fn title_from_template_tags() {
        let fields = FieldTemplate::new().with(
            "tags",
            json!([["title", "Tagged"], ["d", "ignored"], ["t", "nostr"]]),
        );
        let draft = ArticleAdapter.build("doc-1", &fields);

        assert_eq!(draft.tag_value("title"), Some("Tagged"));
        assert_eq!(draft.tag_value("d"), Some("doc-1"));
        assert_eq!(draft.tags.iter().filter(|t| t.name == "d").count(), 1);
        assert_eq!(draft.tag_value("t"), Some("nostr"));
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let draft = ArticleAdapter.build("doc-1", &FieldTemplate::new());
        assert_eq!(draft.content, "");
        assert_eq!(draft.tag_value("title"), Some(""));
        assert_eq!(ArticleAdapter.title(&signed(draft)), "Untitled");
    }

    #[test]
    fn malformed_tags_yield_no_extra_tags() {
        let fields = FieldTemplate::new().with("tags", "not-an-array");
        let draft = ArticleAdapter.build("doc-1", &fields);
        assert_eq!(draft.tags.len(), 2);

        let mut updated = draft.clone();
        ArticleAdapter.apply_update(&mut updated, &fields);
        assert_eq!(updated.tags, draft.tags);
    }

    #[test]
    fn update_replaces_title_and_content() {
        let mut draft = ArticleAdapter.build(
            "doc-1",
            &FieldTemplate::new().with("title", "Old").with("content", "old"),
        );
        ArticleAdapter.apply_update(&mut draft, &FieldTemplate::new().with("title", "New"));

        assert_eq!(draft.tag_value("title"), Some("New"));
        assert_eq!(draft.tags.iter().filter(|t| t.name == "title").count(), 1);
        assert_eq!(draft.content, "old");
    }
}
