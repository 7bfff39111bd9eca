//! Records: the notes a user keeps about a contact.

use chrono::{DateTime, Utc};
use peoplepad_embeddings::Embedding;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// A stored record.
///
/// `embedding` is derived from `notes` alone. It stays `None` until the
/// first embedding job for the record lands, and keeps its previous value
/// while a newer job is still running after an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identifier.
    pub id: Uuid,

    /// The user owning this record.
    pub owner_id: Uuid,

    /// Display name.
    pub name: String,

    /// Free-text notes.
    pub notes: Option<String>,

    /// Tags, unique within the record.
    pub tags: Vec<String>,

    /// Embedding of `notes`, once computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record or its embedding last changed.
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Create a fresh record from a validated draft.
    pub fn new(owner_id: Uuid, draft: RecordDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: draft.name,
            notes: draft.notes,
            tags: draft.tags,
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether an embedding has been stored.
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    /// The notes, when there is anything worth embedding.
    pub fn embeddable_text(&self) -> Option<&str> {
        embeddable(self.notes.as_deref())
    }

    /// Projection without the vector.
    pub fn summary(&self) -> RecordSummary {
        RecordSummary::from(self.clone())
    }
}

/// `text` unless it is absent or blank.
pub fn embeddable(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

/// Fields supplied on create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub name: String,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl RecordDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Check the draft and normalise its tags.
    ///
    /// Tags are trimmed, blanks are dropped and duplicates collapse onto
    /// their first occurrence.
    pub fn validate(mut self) -> Result<Self> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidRecord("name must not be empty".to_string()));
        }
        self.name = name.to_string();

        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        self.tags = tags;

        Ok(self)
    }
}

/// A record without its vector, as returned to search callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Record> for RecordSummary {
    fn from(record: Record) -> Self {
        Self {
            id: record.id,
            owner_id: record.owner_id,
            name: record.name,
            notes: record.notes,
            tags: record.tags,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// A record whose notes still need an embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEmbedding {
    pub id: Uuid,
    pub text: String,
}
