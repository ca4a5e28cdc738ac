//! Fairness selection over token-weighted candidates

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use allot_core::Candidate;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Select `min(capacity, candidates.len())` candidates, lowest weight first.
///
/// Candidates are grouped by their exact weight. Groups are admitted whole in
/// ascending weight order as long as they fit into the remaining capacity. The
/// first group that does not fit is the boundary group: the remaining places
/// are filled with a uniformly random sample of it, drawn as the prefix of a
/// random permutation. `rng` is only used for the boundary group.
///
/// A candidate is never passed over in favor of one with a strictly higher
/// weight. Admitted groups keep their input order; ids occurring more than
/// once are considered once.
///
/// The weight of every selected entry of `candidates` is incremented by one,
/// reflecting the weight after the grant.
pub fn select<I, R>(candidates: &mut [Candidate<I>], capacity: usize, rng: &mut R) -> Vec<I>
where
    I: Copy + Eq + Hash,
    R: Rng + ?Sized,
{
    let mut seen = HashSet::with_capacity(candidates.len());
    let mut groups: BTreeMap<u32, Vec<I>> = BTreeMap::new();
    for candidate in candidates.iter() {
        if seen.insert(candidate.id) {
            groups.entry(candidate.weight).or_default().push(candidate.id);
        }
    }

    let mut selected = Vec::with_capacity(capacity.min(seen.len()));
    for (weight, mut group) in groups {
        let remaining = capacity - selected.len();
        if remaining == 0 {
            break;
        }

        if group.len() <= remaining {
            selected.append(&mut group);
            continue;
        }

        debug!(
            weight,
            group = group.len(),
            remaining,
            "sampling boundary group"
        );
        group.shuffle(rng);
        group.truncate(remaining);
        selected.append(&mut group);
        break;
    }

    let mut bump: HashSet<I> = selected.iter().copied().collect();
    for candidate in candidates.iter_mut() {
        if bump.remove(&candidate.id) {
            candidate.weight = candidate.weight.saturating_add(1);
        }
    }

    selected
}
