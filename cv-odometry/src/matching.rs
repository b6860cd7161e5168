use crate::{Descriptor, TrackingError};
use bitarray::Hamming;
use hnsw::{Hnsw, Searcher};
use log::*;
use rand_pcg::Pcg64;
use space::Neighbor;

/// A match from a feature in the old frame to a feature in the new frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correspondence {
    /// Index into the old frame's [`FeatureSet`](crate::FeatureSet).
    pub old: usize,
    /// Index into the new frame's [`FeatureSet`](crate::FeatureSet).
    pub new: usize,
    /// Descriptor distance to the nearest neighbor.
    pub distance: u32,
    /// Descriptor distance to the second nearest neighbor.
    pub second_distance: u32,
}

impl Correspondence {
    /// How much closer the match is than the runner up, in `[0, 1]`.
    pub fn confidence(&self) -> f32 {
        if self.second_distance == 0 {
            0.0
        } else {
            1.0 - self.distance as f32 / self.second_distance as f32
        }
    }
}

/// Finds correspondences between two descriptor sets.
pub trait FeatureMatcher {
    /// Matches every descriptor in `old` against `new`, keeping a match only when
    /// its nearest neighbor is closer than `ratio` times the second nearest.
    ///
    /// Returns [`TrackingError::MatchingFailed`] when the search cannot run at all,
    /// which is distinct from running and finding nothing.
    fn match_descriptors(
        &self,
        old: &[Descriptor],
        new: &[Descriptor],
        ratio: f32,
    ) -> Result<Vec<Correspondence>, TrackingError>;
}

type DescriptorIndex = Hnsw<Hamming, Descriptor, Pcg64, 12, 24>;

/// Ratio-test matching over an HNSW approximate nearest neighbor index of the new frame.
#[derive(Debug, Copy, Clone)]
pub struct HnswMatcher {
    /// The size of the dynamic candidate list during search (`ef`).
    pub search_width: usize,
}

impl HnswMatcher {
    pub fn new(search_width: usize) -> Self {
        Self { search_width }
    }
}

impl Default for HnswMatcher {
    fn default() -> Self {
        Self::new(24)
    }
}

impl FeatureMatcher for HnswMatcher {
    fn match_descriptors(
        &self,
        old: &[Descriptor],
        new: &[Descriptor],
        ratio: f32,
    ) -> Result<Vec<Correspondence>, TrackingError> {
        if old.is_empty() {
            return Err(TrackingError::MatchingFailed {
                reason: "old frame has no descriptors",
            });
        }
        if new.len() < 2 {
            return Err(TrackingError::MatchingFailed {
                reason: "new frame has fewer than two descriptors",
            });
        }

        let mut searcher = Searcher::default();
        let mut index = DescriptorIndex::new(Hamming);
        for descriptor in new {
            index.insert(descriptor.clone(), &mut searcher);
        }
        trace!("built descriptor index over {} features", new.len());

        let ef = self.search_width.max(2);
        let mut matches = Vec::new();
        for (old_ix, descriptor) in old.iter().enumerate() {
            let mut neighbors = [Neighbor {
                index: !0,
                distance: !0,
            }; 2];
            let found = index.nearest(descriptor, ef, &mut searcher, &mut neighbors);
            if found.len() < 2 {
                return Err(TrackingError::MatchingFailed {
                    reason: "index returned fewer than two neighbors",
                });
            }
            let (nearest, second) = (found[0], found[1]);
            if (nearest.distance as f32) < ratio * second.distance as f32 {
                matches.push(Correspondence {
                    old: old_ix,
                    new: nearest.index,
                    distance: nearest.distance,
                    second_distance: second.distance,
                });
            }
        }
        debug!(
            "matched {} of {} descriptors against {}",
            matches.len(),
            old.len(),
            new.len()
        );
        Ok(matches)
    }
}
