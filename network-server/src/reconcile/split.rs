//! Split chains and length apportionment.
//!
//! When a link `A-B` has been cut into pieces, its itinerary records must be
//! replaced by one record per piece, in travel order, each carrying its share
//! of the original link's length. This module finds that order and the
//! shares.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::debug;

use super::error::{Conflict, ReconcileError};
use crate::domain::{Link, LinkKey, NodeId};

/// One piece of a split link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplitSegment {
    /// The piece's new key.
    pub key: LinkKey,

    /// Position in the chain from the original from-node, 0-based.
    pub order_index: usize,

    /// Fraction of the original length preceding this piece.
    pub start_ratio: f64,

    /// Fraction of the original length covered by this piece.
    pub length_ratio: f64,
}

impl SplitSegment {
    pub fn end_ratio(&self) -> f64 {
        self.start_ratio + self.length_ratio
    }
}

/// Original key to ordered replacement pieces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SplitMapping {
    segments: BTreeMap<LinkKey, Vec<SplitSegment>>,
}

impl SplitMapping {
    /// Ordered pieces replacing `key`, if it was split.
    pub fn get(&self, key: &LinkKey) -> Option<&[SplitSegment]> {
        self.segments.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &LinkKey) -> bool {
        self.segments.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkKey, &[SplitSegment])> {
        self.segments.iter().map(|(k, v)| (k, v.as_slice()))
    }

    fn insert(&mut self, key: LinkKey, segments: Vec<SplitSegment>) {
        self.segments.insert(key, segments);
    }
}

/// Order the pieces of every split link and give each its share.
///
/// `links` must already carry resolved endpoint ids and derived lengths;
/// `stale_keys[i]` is the key link `i` had when read. Shares follow the
/// pieces' stored lengths, or their geometry when any stored length is
/// zero. Links are not modified.
pub fn apportion_splits(
    splits: &BTreeMap<LinkKey, BTreeSet<NodeId>>,
    links: &[Link],
    stale_keys: &[Option<LinkKey>],
) -> Result<SplitMapping, ReconcileError> {
    let mut mapping = SplitMapping::default();
    let mut conflicts = Vec::new();

    for (original, interior) in splits {
        let pieces: HashMap<LinkKey, &Link> = stale_keys
            .iter()
            .zip(links)
            .filter(|(stale, _)| **stale == Some(*original))
            .filter_map(|(_, link)| Some((link.key()?, link)))
            .collect();

        let chain = match order_chain(original, interior, &pieces) {
            Ok(chain) => chain,
            Err(conflict) => {
                conflicts.push(conflict);
                continue;
            }
        };

        let stored: Vec<f64> = chain.iter().map(|key| pieces[key].length).collect();
        let ratios = if stored.iter().all(|l| *l > 0.0) {
            length_ratios(&stored)
        } else {
            let geometric: Vec<f64> = chain
                .iter()
                .map(|key| pieces[key].geometric_length())
                .collect();
            length_ratios(&geometric)
        };

        let mut start_ratio = 0.0;
        let mut segments = Vec::with_capacity(chain.len());
        for (order_index, (key, length_ratio)) in chain.iter().zip(ratios).enumerate() {
            segments.push(SplitSegment {
                key: *key,
                order_index,
                start_ratio,
                length_ratio,
            });
            start_ratio += length_ratio;
        }

        debug!(%original, pieces = segments.len(), "apportioned split link");
        mapping.insert(*original, segments);
    }

    if conflicts.is_empty() {
        Ok(mapping)
    } else {
        Err(ReconcileError::Consistency(conflicts))
    }
}

/// Pair each from-candidate with a to-candidate, then walk the pairs from
/// the original from-node.
fn order_chain(
    original: &LinkKey,
    interior: &BTreeSet<NodeId>,
    pieces: &HashMap<LinkKey, &Link>,
) -> Result<Vec<LinkKey>, Conflict> {
    let unorderable = |at: NodeId| Conflict::UnorderableSplit {
        key: *original,
        at,
    };

    let mut available_from: Vec<NodeId> = std::iter::once(original.from)
        .chain(interior.iter().copied())
        .collect();
    let mut available_to: Vec<NodeId> = interior
        .iter()
        .copied()
        .chain(std::iter::once(original.to))
        .collect();
    let required = available_from.len();

    let mut next: HashMap<NodeId, NodeId> = HashMap::new();
    while let Some(&from) = available_from.first() {
        let position = available_to
            .iter()
            .position(|to| pieces.contains_key(&LinkKey::new(from, *to, original.base)))
            .ok_or_else(|| unorderable(from))?;
        let to = available_to.remove(position);
        available_from.remove(0);
        next.insert(from, to);
    }

    let mut chain = Vec::with_capacity(required);
    let mut at = original.from;
    while chain.len() < required {
        let to = *next.get(&at).ok_or_else(|| unorderable(at))?;
        chain.push(LinkKey::new(at, to, original.base));
        at = to;
    }
    if at != original.to {
        return Err(unorderable(at));
    }

    Ok(chain)
}

/// Each length as a share of the total; even shares when the total is zero.
fn length_ratios(lengths: &[f64]) -> Vec<f64> {
    let total: f64 = lengths.iter().sum();
    if total > 0.0 {
        lengths.iter().map(|l| l / total).collect()
    } else {
        let even = 1.0 / lengths.len() as f64;
        vec![even; lengths.len()]
    }
}
