use crate::events::{title_tag, EventDraft, NostrEvent};
use crate::kinds::is_addressable_kind;

use super::{base_draft, FieldTemplate, KindAdapter};

const TITLE_TAGS: [&str; 3] = ["title", "name", "subject"];
const TITLE_PREVIEW_CHARS: usize = 60;

/// Fallback for any kind without a dedicated adapter.
///
/// Replaceable exactly when the kind is in the addressable range
/// (30000..40000).
#[derive(Debug, Clone, Copy)]
pub struct GenericAdapter {
    kind: u16,
}

impl GenericAdapter {
    pub fn new(kind: u16) -> Self {
        Self { kind }
    }
}

impl KindAdapter for GenericAdapter {
    fn kind(&self) -> u16 {
        self.kind
    }

    fn is_replaceable(&self) -> bool {
        is_addressable_kind(self.kind)
    }

    /// First non-empty of: `title`, `name`, `subject` tags, a content
    /// preview, then `Kind N event`.
    fn title(&self, event: &NostrEvent) -> String {
        let tagged = TITLE_TAGS
            .iter()
            .filter_map(|name| event.tag_value(name))
            .find(|value| !value.is_empty());
        if let Some(title) = tagged {
            return title.to_string();
        }

        if !event.content.is_empty() {
            let mut preview: String = event.content.chars().take(TITLE_PREVIEW_CHARS).collect();
            if event.content.chars().count() > TITLE_PREVIEW_CHARS {
                preview.push('…');
            }
            return preview;
        }

        format!("Kind {} event", event.kind)
    }

    fn build(&self, identifier: &str, fields: &FieldTemplate) -> EventDraft {
        let mut draft = base_draft(self.kind, identifier, fields);
        if let Some(title) = fields.title().filter(|t| !t.is_empty()) {
            draft.push_tag(title_tag(&title));
        }
        draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NostrTag;
    use serde_json::json;

    fn event(kind: u16, content: &str, tags: Vec<NostrTag>) -> NostrEvent {
        NostrEvent {
            event_id: "id".to_string(),
            kind,
            pubkey: "a".repeat(64),
            created_at: 1,
            content: content.to_string(),
            tags,
            raw_json: "{}".to_string(),
        }
    }

    fn tag(name: &str, value: &str) -> NostrTag {
        NostrTag::new(name, vec![value.to_string()])
    }

    #[test]
    fn replaceable_follows_kind_range() {
        assert!(GenericAdapter::new(30000).is_replaceable());
        assert!(GenericAdapter::new(39999).is_replaceable());
        assert!(!GenericAdapter::new(40000).is_replaceable());
        assert!(!GenericAdapter::new(1).is_replaceable());
    }

    #[test]
    fn title_priority() {
        let adapter = GenericAdapter::new(31000);
        let all = vec![tag("subject", "S"), tag("name", "N"), tag("title", "T")];
        assert_eq!(adapter.title(&event(31000, "body", all)), "T");

        let no_title = vec![tag("subject", "S"), tag("name", "N")];
        assert_eq!(adapter.title(&event(31000, "body", no_title)), "N");

        let empty_title = vec![tag("title", ""), tag("subject", "S")];
        assert_eq!(adapter.title(&event(31000, "body", empty_title)), "S");

        assert_eq!(adapter.title(&event(31000, "short body", vec![])), "short body");
        assert_eq!(adapter.title(&event(31000, "", vec![])), "Kind 31000 event");
    }

    #[test]
    fn long_content_preview_is_truncated() {
        let adapter = GenericAdapter::new(1);
        let content = "x".repeat(61);
        let title = adapter.title(&event(1, &content, vec![]));
        assert_eq!(title, format!("{}…", "x".repeat(60)));

        let exact = "y".repeat(60);
        assert_eq!(adapter.title(&event(1, &exact, vec![])), exact);
    }

    #[test]
    fn build_and_update_with_tags() {
        let adapter = GenericAdapter::new(31000);
        let fields = FieldTemplate::new()
            .with("content", "{}")
            .with("tags", json!([["t", "one"]]));
        let mut draft = adapter.build("doc-1", &fields);
        assert_eq!(draft.tag_value("d"), Some("doc-1"));
        assert_eq!(draft.content, "{}");

        adapter.apply_update(&mut draft, &FieldTemplate::new().with("tags", json!([["t", "two"]])));
        let topics: Vec<_> = draft.tags.iter().filter(|t| t.name == "t").collect();
        assert_eq!(topics.len(), 2);
        assert_eq!(draft.content, "{}");
    }

    #[test]
    fn malformed_tags_do_not_fail() {
        let adapter = GenericAdapter::new(31000);
        let draft = adapter.build("doc-1", &FieldTemplate::new().with("tags", "not-an-array"));
        assert_eq!(draft.tags.len(), 1);
        assert_eq!(adapter.label(), "Addressable (31000)");
    }
}
