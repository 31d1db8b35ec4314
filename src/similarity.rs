//! Same-story detection between two headlines.
//!
//! Two tests are OR'd:
//!
//! 1. **Jaccard** overlap of the content-word sets. Catches reordered or
//!    lightly paraphrased headlines.
//! 2. **Character ratio** (Ratcliff/Obershelp, `2·M / (|a| + |b|)`) between the
//!    normalized strings. Catches near-identical strings whose token
//!    boundaries differ.
//!
//! A pair where either side normalizes to the empty string never matches.

use crate::normalize::NormalizedTitle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Tuned operating point. Changing these changes which stories collapse.
pub const DEFAULT_JACCARD_THRESHOLD: f64 = 0.75;
pub const DEFAULT_RATIO_THRESHOLD: f64 = 0.82;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityThresholds {
    pub jaccard: f64,
    pub ratio: f64,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            jaccard: DEFAULT_JACCARD_THRESHOLD,
            ratio: DEFAULT_RATIO_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityJudge {
    thresholds: SimilarityThresholds,
}

impl SimilarityJudge {
    pub fn new(thresholds: SimilarityThresholds) -> Self {
        Self { thresholds }
    }

    /// Raw-title convenience wrapper around [`Self::same_story`].
    pub fn is_same_story(&self, a: &str, b: &str) -> bool {
        self.same_story(&NormalizedTitle::new(a), &NormalizedTitle::new(b))
    }

    pub fn same_story(&self, a: &NormalizedTitle, b: &NormalizedTitle) -> bool {
        if a.is_empty() || b.is_empty() {
            return false;
        }
        if !a.tokens().is_empty()
            && !b.tokens().is_empty()
            && jaccard(a.tokens(), b.tokens()) >= self.thresholds.jaccard
        {
            return true;
        }
        sequence_ratio(a.text(), b.text()) >= self.thresholds.ratio
    }
}

/// `|A ∩ B| / max(1, |A ∪ B|)`.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let inter = a.intersection(b).count();
    let union = a.union(b).count().max(1);
    inter as f64 / union as f64
}

/// Ratcliff/Obershelp similarity over characters, in `[0, 1]`.
///
/// Two empty strings are identical (1.0).
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Total size of the matching blocks: take the longest common substring, then
/// recurse on the pieces to its left and right.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }

    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest block `a[i..i+k] == b[j..j+k]` inside the given windows. Ties go to
/// the smallest `i`, then the smallest `j`.
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    // run lengths ending at b[j] for the previous row of a
    let mut prev: HashMap<usize, usize> = HashMap::new();
    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = if j > 0 {
                    prev.get(&(j - 1)).copied().unwrap_or(0) + 1
                } else {
                    1
                };
                next.insert(j, k);
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            }
        }
        prev = next;
    }
    (best_i, best_j, best_k)
}
