//! Search predicates and the reference ranking.

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use peoplepad_embeddings::{DistanceMetric, EmbeddingError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::record::{Record, RecordSummary};

/// Which records a search may return.
///
/// A record matches when it belongs to `owner_id`, was created inside the
/// inclusive `[start, end]` window (open bounds are unbounded), and, when
/// prefixes are given, at least one of its tags starts with at least one
/// prefix. Prefix comparison ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub owner_id: Uuid,

    #[serde(default)]
    pub start: Option<DateTime<Utc>>,

    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tag_prefixes: Vec<String>,
}

impl SearchFilter {
    /// Match every record of `owner_id`.
    pub fn for_owner(owner_id: Uuid) -> Self {
        Self {
            owner_id,
            start: None,
            end: None,
            tag_prefixes: Vec::new(),
        }
    }

    /// Only records created at or after `start`.
    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Only records created at or before `end`.
    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Only records with a tag starting with one of `prefixes`.
    /// Blank prefixes are ignored.
    pub fn with_tag_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tag_prefixes = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    /// Evaluate the predicate against one record.
    pub fn matches(&self, record: &Record) -> bool {
        record.owner_id == self.owner_id
            && self.start.is_none_or(|start| record.created_at >= start)
            && self.end.is_none_or(|end| record.created_at <= end)
            && self.matches_tags(&record.tags)
    }

    fn matches_tags(&self, tags: &[String]) -> bool {
        let prefixes: Vec<String> = self
            .tag_prefixes
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        if prefixes.is_empty() {
            return true;
        }

        tags.iter().any(|tag| {
            let tag = tag.to_lowercase();
            prefixes.iter().any(|prefix| tag.starts_with(prefix.as_str()))
        })
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// The matched record, without its vector.
    pub record: RecordSummary,

    /// Distance to the query vector. Smaller is more similar.
    pub distance: f32,
}

/// Map a query/stored vector length disagreement onto the store taxonomy.
pub(crate) fn distance_error(err: EmbeddingError) -> StoreError {
    match err {
        EmbeddingError::DimensionMismatch { expected, actual } => {
            StoreError::DimensionMismatch { expected, actual }
        }
        other => StoreError::InvalidRecord(other.to_string()),
    }
}

/// Rank `candidates` by distance to `query`, closest first.
///
/// Records without an embedding are skipped. Equal distances are ordered by
/// record id so a fixed data set always ranks the same way. This linear scan
/// is the correctness baseline every store-native ranking must agree with.
pub fn rank_records<I>(
    query: &[f32],
    candidates: I,
    metric: DistanceMetric,
    limit: usize,
) -> Result<Vec<SearchHit>>
where
    I: IntoIterator<Item = Record>,
{
    let mut scored: Vec<(OrderedFloat<f32>, Record)> = Vec::new();
    for record in candidates {
        let Some(embedding) = record.embedding.as_deref() else {
            continue;
        };
        let distance = metric
            .distance(embedding, query)
            .map_err(distance_error)?;
        scored.push((OrderedFloat(distance), record));
    }

    scored.sort_by_key(|(distance, record)| (*distance, record.id));
    scored.truncate(limit);

    Ok(scored
        .into_iter()
        .map(|(distance, record)| SearchHit {
            record: record.into(),
            distance: distance.0,
        })
        .collect())
}
