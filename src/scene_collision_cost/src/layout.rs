//! Index mapping between batched trajectory storage and flat predictor queries.
//!
//! Trajectory data is stored row-major in `(batch, horizon, link)` order. The
//! predictor sees the same storage as `(query, link)` where
//! `query = batch_index * horizon + step`. Merging the two leading axes is a pure
//! reinterpretation of the index space; no element moves.
//!
//! ```text
//! (b, h, l)  --merge-->  (q = b*H + h, l)  --split-->  (b, h, l)
//! ```

use std::fmt;

use crate::error::{CollisionCostError, Result};

/// Dimensions of a `(batch, horizon, links)` trajectory batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchLayout {
    batch: usize,
    horizon: usize,
    links: usize,
}

impl BatchLayout {
    /// Create a layout. Every dimension must be at least 1.
    pub fn new(batch: usize, horizon: usize, links: usize) -> Result<Self> {
        if batch == 0 || horizon == 0 || links == 0 {
            return Err(CollisionCostError::shape(
                "batch, horizon and links >= 1",
                format!("({batch}, {horizon}, {links})"),
            ));
        }
        if batch
            .checked_mul(horizon)
            .and_then(|q| q.checked_mul(links))
            .is_none()
        {
            return Err(CollisionCostError::shape(
                "an element count that fits in usize",
                format!("({batch}, {horizon}, {links})"),
            ));
        }
        Ok(Self {
            batch,
            horizon,
            links,
        })
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn links(&self) -> usize {
        self.links
    }

    /// Number of flat queries, `batch * horizon`.
    pub fn num_queries(&self) -> usize {
        self.batch * self.horizon
    }

    /// Number of link poses, `batch * horizon * links`.
    pub fn num_elements(&self) -> usize {
        self.num_queries() * self.links
    }

    /// Merge `(batch_index, step)` into a flat query index.
    #[inline]
    pub fn merge(&self, batch_index: usize, step: usize) -> usize {
        debug_assert!(batch_index < self.batch && step < self.horizon);
        batch_index * self.horizon + step
    }

    /// Split a flat query index back into `(batch_index, step)`.
    #[inline]
    pub fn split(&self, query: usize) -> (usize, usize) {
        debug_assert!(query < self.num_queries());
        (query / self.horizon, query % self.horizon)
    }

    /// Storage offset of link `link` at `(batch_index, step)`.
    #[inline]
    pub fn flat_index(&self, batch_index: usize, step: usize, link: usize) -> usize {
        self.query_index(self.merge(batch_index, step), link)
    }

    /// Storage offset of link `link` in flat query `query`.
    #[inline]
    pub fn query_index(&self, query: usize, link: usize) -> usize {
        debug_assert!(link < self.links);
        query * self.links + link
    }

    /// Check that a buffer holds exactly one entry per link pose.
    pub fn check_len(&self, what: &str, len: usize) -> Result<()> {
        if len != self.num_elements() {
            return Err(CollisionCostError::shape(
                format!("{} {what} for {self}", self.num_elements()),
                format!("{len} {what}"),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for BatchLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.batch, self.horizon, self.links)
    }
}
