use crate::events::{title_tag, EventDraft, NostrEvent, KIND_WIKI, TAG_TITLE};

use super::{base_draft, FieldTemplate, KindAdapter, UNTITLED};

/// Wiki page (NIP-54, kind 30818). Replaceable.
#[derive(Debug, Clone, Copy, Default)]
pub struct WikiAdapter;

impl KindAdapter for WikiAdapter {
    fn kind(&self) -> u16 {
        KIND_WIKI
    }

    fn label(&self) -> String {
        "Wiki".to_string()
    }

    fn is_replaceable(&self) -> bool {
        true
    }

    /// `title` tag, then the `d` identifier.
    fn title(&self, event: &NostrEvent) -> String {
        event
            .tag_value(TAG_TITLE)
            .or_else(|| event.identifier())
            .filter(|title| !title.is_empty())
            .unwrap_or(UNTITLED)
            .to_string()
    }

    fn build(&self, identifier: &str, fields: &FieldTemplate) -> EventDraft {
        let mut draft = base_draft(KIND_WIKI, identifier, fields);
        if let Some(title) = fields.title().filter(|t| !t.is_empty()) {
            draft.push_tag(title_tag(&title));
        }
        draft
    }
}
