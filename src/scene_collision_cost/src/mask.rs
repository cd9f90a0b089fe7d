//! Per-(query, link) collision masks returned by the predictor.

use crate::error::{CollisionCostError, Result};

/// Boolean collision flags shaped `(num_queries, num_links)`, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionMask {
    num_queries: usize,
    num_links: usize,
    flags: Vec<bool>,
}

impl CollisionMask {
    /// Wrap flat row-major flags.
    pub fn new(num_queries: usize, num_links: usize, flags: Vec<bool>) -> Result<Self> {
        if flags.len() != num_queries * num_links {
            return Err(CollisionCostError::shape(
                format!("{} mask entries", num_queries * num_links),
                flags.len(),
            ));
        }
        Ok(Self {
            num_queries,
            num_links,
            flags,
        })
    }

    /// A mask with nothing flagged.
    pub fn clear(num_queries: usize, num_links: usize) -> Self {
        Self {
            num_queries,
            num_links,
            flags: vec![false; num_queries * num_links],
        }
    }

    /// Threshold continuous predictor scores: a link is flagged when its score
    /// reaches `cutoff`.
    pub fn from_scores(
        num_queries: usize,
        num_links: usize,
        scores: &[f32],
        cutoff: f32,
    ) -> Result<Self> {
        Self::new(
            num_queries,
            num_links,
            scores.iter().map(|&s| s >= cutoff).collect(),
        )
    }

    pub fn num_queries(&self) -> usize {
        self.num_queries
    }

    pub fn num_links(&self) -> usize {
        self.num_links
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.num_queries, self.num_links)
    }

    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub fn get(&self, query: usize, link: usize) -> bool {
        self.flags[query * self.num_links + link]
    }

    pub fn set(&mut self, query: usize, link: usize, value: bool) {
        self.flags[query * self.num_links + link] = value;
    }

    /// Flags of a single query.
    pub fn query(&self, query: usize) -> &[bool] {
        let start = query * self.num_links;
        &self.flags[start..start + self.num_links]
    }

    /// Total number of flagged entries.
    pub fn count(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    pub fn any(&self) -> bool {
        self.flags.iter().any(|&f| f)
    }

    /// Element-wise OR. A link is in collision if either mask flags it.
    pub fn combine(&self, other: &CollisionMask) -> Result<CollisionMask> {
        let mut out = self.clone();
        out.combine_in_place(other)?;
        Ok(out)
    }

    /// Element-wise OR into `self`.
    pub fn combine_in_place(&mut self, other: &CollisionMask) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(CollisionCostError::shape(
                format!("{:?}", self.shape()),
                format!("{:?}", other.shape()),
            ));
        }
        for (a, &b) in self.flags.iter_mut().zip(&other.flags) {
            *a |= b;
        }
        Ok(())
    }

    /// Cast to numeric costs: 1.0 where flagged, 0.0 otherwise.
    pub fn to_costs(&self) -> Vec<f64> {
        self.flags
            .iter()
            .map(|&f| if f { 1.0 } else { 0.0 })
            .collect()
    }

    /// Colliding-link count per query.
    pub fn link_counts(&self) -> Vec<usize> {
        self.flags
            .chunks(self.num_links.max(1))
            .map(|row| row.iter().filter(|&&f| f).count())
            .collect()
    }
}
