use serde::{Deserialize, Serialize};

/// Who produced a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// One sealed line of the visible conversation. Never edited after append.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// Ordered, append-only log of the visible conversation.
///
/// Insertion order is conversation order. Individual entries are never edited
/// or removed; a reset clears the whole log at once.
#[derive(Debug, Default)]
pub struct TranscriptStore {
    entries: Vec<TranscriptEntry>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seal a new entry at the end of the log.
    pub fn append(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            speaker,
            text: text.into(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Used only on session reset.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut store = TranscriptStore::new();
        store.append(Speaker::User, "hello");
        store.append(Speaker::Assistant, "hi there");
        store.append(Speaker::User, "bye");

        let speakers: Vec<Speaker> = store.entries().iter().map(|e| e.speaker).collect();
        assert_eq!(
            speakers,
            vec![Speaker::User, Speaker::Assistant, Speaker::User]
        );
        assert_eq!(store.entries()[1].text, "hi there");
    }

    #[test]
    fn clear_empties_the_whole_log() {
        let mut store = TranscriptStore::new();
        store.append(Speaker::User, "a");
        store.append(Speaker::Assistant, "b");
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.entries(), &[]);
    }
}
