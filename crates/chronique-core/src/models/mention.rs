use serde::{Deserialize, Serialize};

/// Which part of an episode summary a mention was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionSection {
    Programme,
    Highlight,
}

/// A raw (title, author, critic) triple extracted upstream from an
/// episode summary. Ephemeral input; never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub source_reference: String,
    pub section: MentionSection,
    pub title_text: String,
    pub author_text: String,
    pub critic_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Mention {
    pub fn new(
        source_reference: impl Into<String>,
        section: MentionSection,
        title_text: impl Into<String>,
        author_text: impl Into<String>,
        critic_text: impl Into<String>,
    ) -> Self {
        Self {
            source_reference: source_reference.into(),
            section,
            title_text: title_text.into(),
            author_text: author_text.into(),
            critic_text: critic_text.into(),
            note: None,
        }
    }
}
