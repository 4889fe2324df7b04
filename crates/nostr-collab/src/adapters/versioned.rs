use crate::events::{title_tag, EventDraft, NostrEvent, KIND_VERSIONED_ARTICLE, TAG_TITLE};

use super::{base_draft, FieldTemplate, KindAdapter, UNTITLED};

/// Versioned article (kind 3023). Regular event: every publish is kept, and
/// the `d` tag groups the versions of one document.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionedArticleAdapter;

impl KindAdapter for VersionedArticleAdapter {
    fn kind(&self) -> u16 {
        KIND_VERSIONED_ARTICLE
    }

    fn label(&self) -> String {
        "Versioned Article".to_string()
    }

    fn is_replaceable(&self) -> bool {
        false
    }

    fn title(&self, event: &NostrEvent) -> String {
        event
            .tag_value(TAG_TITLE)
            .filter(|title| !title.is_empty())
            .unwrap_or(UNTITLED)
            .to_string()
    }

    fn build(&self, identifier: &str, fields: &FieldTemplate) -> EventDraft {
        let mut draft = base_draft(KIND_VERSIONED_ARTICLE, identifier, fields);
        if let Some(title) = fields.title().filter(|t| !t.is_empty()) {
            draft.push_tag(title_tag(&title));
        }
        draft
    }
}
