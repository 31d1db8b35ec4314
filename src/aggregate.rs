//! Cross-source merging and near-duplicate removal.

use crate::models::Candidate;
use crate::similarity::SimilarityJudge;
use itertools::Itertools;
use tracing::{debug, instrument};

/// Drop exact-URL repeats, then drop every candidate that tells the same
/// story as one kept earlier. Input order is preference order: the first
/// occurrence always wins.
///
/// Pairwise scan, O(n²) in the number of candidates. Runs see tens of items.
#[instrument(level = "info", skip_all, fields(input = candidates.len()))]
pub fn dedupe(candidates: Vec<Candidate>, judge: &SimilarityJudge) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates.into_iter().unique_by(|c| c.url.clone()) {
        let duplicate_of = kept
            .iter()
            .find(|k| judge.same_story(k.normalized(), candidate.normalized()));
        match duplicate_of {
            Some(k) => debug!(
                dropped = %candidate.title,
                dropped_source = %candidate.source,
                kept = %k.title,
                kept_source = %k.source,
                "Near-duplicate dropped"
            ),
            None => kept.push(candidate),
        }
    }
    kept
}
