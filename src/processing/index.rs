//! Exact nearest-neighbor search over fragment embeddings.

use super::types::{Fragment, IndexError};

/// One search result: a fragment position and its squared Euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    /// Position of the fragment in the session's fragment list.
    pub fragment: usize,
    /// Squared Euclidean distance to the query; lower is closer.
    pub distance: f32,
}

/// Read-only nearest-neighbor structure built once per document.
pub trait VectorIndex: Send + Sync {
    /// Number of indexed vectors.
    fn len(&self) -> usize;

    /// Vector dimension accepted by `search`.
    fn dimension(&self) -> usize;

    /// Whether the index holds at least one vector.
    fn is_available(&self) -> bool {
        self.len() > 0
    }

    /// Up to `k` nearest fragments in ascending distance. Ties keep insertion order.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError>;
}

/// Brute-force index using squared L2 distance.
#[derive(Debug, Clone)]
pub struct ExactIndex {
    dimension: usize,
    positions: Vec<usize>,
    vectors: Vec<f32>,
}

impl ExactIndex {
    /// Index every fragment that carries an embedding of length `dimension`.
    ///
    /// Fragments without an embedding are skipped; their positions still resolve correctly
    /// because each vector keeps the index of the fragment it came from.
    pub fn build(fragments: &[Fragment], dimension: usize) -> Self {
        let mut positions = Vec::new();
        let mut vectors = Vec::new();
        for (position, fragment) in fragments.iter().enumerate() {
            if let Some(embedding) = fragment
                .embedding
                .as_ref()
                .filter(|embedding| embedding.len() == dimension)
            {
                positions.push(position);
                vectors.extend_from_slice(embedding);
            }
        }
        Self {
            dimension,
            positions,
            vectors,
        }
    }
}

impl VectorIndex for ExactIndex {
    fn len(&self) -> usize {
        self.positions.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError> {
        if !self.is_available() {
            return Err(IndexError::Unavailable);
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<IndexHit> = self
            .vectors
            .chunks_exact(self.dimension)
            .zip(&self.positions)
            .map(|(vector, &fragment)| IndexHit {
                fragment,
                distance: squared_l2(vector, query),
            })
            .collect();
        // Stable sort keeps insertion order among equal distances.
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let delta = x - y;
            delta * delta
        })
        .sum()
}
