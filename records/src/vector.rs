//! Dimension-checked vector column with brute-force nearest-neighbour ranking.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use peoplepad_embeddings::{DistanceMetric, Embedding};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::filter::distance_error;

/// The embedding column of a record table.
///
/// Every stored vector has exactly `dimension` components. Ranking is a
/// linear scan, which is fine for a personal notebook; a graph-based ANN
/// index would slot in behind the same methods.
#[derive(Debug, Clone)]
pub struct VectorColumn {
    /// Stored vectors by record id.
    vectors: HashMap<Uuid, Embedding>,

    /// Expected dimension of embeddings.
    dimension: usize,
}

impl VectorColumn {
    /// Create an empty column.
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            dimension,
        }
    }

    /// Column dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    /// Store or replace the vector for `id`.
    pub fn set(&mut self, id: Uuid, embedding: &[f32]) -> Result<()> {
        self.check(embedding)?;
        self.vectors.insert(id, embedding.to_vec());
        debug!(record_id = %id, "stored vector");
        Ok(())
    }

    /// Remove the vector for `id`.
    pub fn remove(&mut self, id: &Uuid) -> Option<Embedding> {
        self.vectors.remove(id)
    }

    /// Get the vector for `id`.
    pub fn get(&self, id: &Uuid) -> Option<&Embedding> {
        self.vectors.get(id)
    }

    /// Check if an id has a vector.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.vectors.contains_key(id)
    }

    /// Get the number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Check if the column is empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The `limit` candidates closest to `query`, as `(id, distance)`.
    ///
    /// Candidates without a vector are skipped. Ties are ordered by id.
    pub fn nearest<I>(
        &self,
        query: &[f32],
        candidates: I,
        metric: DistanceMetric,
        limit: usize,
    ) -> Result<Vec<(Uuid, f32)>>
    where
        I: IntoIterator<Item = Uuid>,
    {
        self.check(query)?;

        let mut scored: Vec<(OrderedFloat<f32>, Uuid)> = Vec::new();
        for id in candidates {
            if let Some(vector) = self.vectors.get(&id) {
                let distance = metric.distance(vector, query).map_err(distance_error)?;
                scored.push((OrderedFloat(distance), id));
            }
        }

        scored.sort_unstable();
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(distance, id)| (id, distance.0))
            .collect())
    }
}
