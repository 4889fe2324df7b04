//! Human-readable labels and range classification for event kinds.

/// A kind offered in quick-pick lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestedKind {
    pub kind: u16,
    pub label: &'static str,
}

pub const SUGGESTED_KINDS: &[SuggestedKind] = &[
    SuggestedKind { kind: 30023, label: "Article" },
    SuggestedKind { kind: 3023, label: "Versioned Article" },
    SuggestedKind { kind: 30818, label: "Wiki Page" },
    SuggestedKind { kind: 1, label: "Short Note" },
    SuggestedKind { kind: 30402, label: "Classified" },
    SuggestedKind { kind: 30040, label: "Modular Article" },
];

fn known_label(kind: u16) -> Option<&'static str> {
    let label = match kind {
        0 => "Profile Metadata",
        1 => "Short Note",
        3 => "Contacts",
        4 => "Encrypted DM",
        5 => "Deletion",
        6 => "Repost",
        7 => "Reaction",
        11 => "Thread",
        20 => "Image",
        21 => "Video",
        22 => "Short Video",
        23 => "Story",
        1063 => "Media",
        1111 => "Reply",
        1222 => "Voice Message",
        1934 => "Task",
        3023 => "Versioned Article",
        30023 => "Article",
        30024 => "Draft Article",
        30040 => "Modular Article",
        30402 => "Classified",
        30818 => "Wiki",
        39382 => "Collaborative Pointer",
        _ => return None,
    };
    Some(label)
}

pub fn kind_label(kind: u16) -> String {
    if let Some(label) = known_label(kind) {
        return label.to_string();
    }
    if is_addressable_kind(kind) {
        format!("Addressable ({kind})")
    } else if is_ephemeral_kind(kind) {
        format!("Ephemeral ({kind})")
    } else if is_replaceable_kind(kind) {
        format!("Replaceable ({kind})")
    } else {
        format!("Kind {kind}")
    }
}

/// Parameterized-replaceable kinds: one slot per author + kind + `d` tag.
pub fn is_addressable_kind(kind: u16) -> bool {
    (30000..40000).contains(&kind)
}

/// One slot per author + kind, no `d` identity.
pub fn is_replaceable_kind(kind: u16) -> bool {
    (10000..20000).contains(&kind)
}

/// Not persisted by relays.
pub fn is_ephemeral_kind(kind: u16) -> bool {
    (20000..30000).contains(&kind)
}
