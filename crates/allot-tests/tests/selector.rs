use std::collections::{HashMap, HashSet};

use allot_core::Candidate;
use allot_rocket::select;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Random source that must never be consulted
struct NoRandomness;

impl RngCore for NoRandomness {
    fn next_u32(&mut self) -> u32 {
        panic!("randomness used where the selection is deterministic")
    }

    fn next_u64(&mut self) -> u64 {
        panic!("randomness used where the selection is deterministic")
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        panic!("randomness used where the selection is deterministic")
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
        panic!("randomness used where the selection is deterministic")
    }
}

fn candidates(weights: &[u32]) -> Vec<Candidate<usize>> {
    weights
        .iter()
        .enumerate()
        .map(|(id, &weight)| Candidate::new(id, weight))
        .collect()
}

#[test]
fn test_random_inputs_respect_size_and_fairness() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..500 {
        let n = rng.gen_range(0..30);
        let k = rng.gen_range(0..40);
        let weights: Vec<u32> = (0..n).map(|_| rng.gen_range(0..4)).collect();
        let mut input = candidates(&weights);

        let selected = select(&mut input, k, &mut rng);

        assert_eq!(selected.len(), k.min(n), "weights {weights:?}, capacity {k}");
        let unique: HashSet<usize> = selected.iter().copied().collect();
        assert_eq!(unique.len(), selected.len(), "No id may be selected twice.");
        assert!(unique.iter().all(|&id| id < n), "Only input ids may be selected.");

        // Nobody is passed over for somebody with more tokens
        let max_selected = unique.iter().map(|&id| weights[id]).max();
        let min_skipped = (0..n)
            .filter(|id| !unique.contains(id))
            .map(|id| weights[id])
            .min();
        if let (Some(max_selected), Some(min_skipped)) = (max_selected, min_skipped) {
            assert!(
                max_selected <= min_skipped,
                "weights {weights:?}: selected weight {max_selected} over skipped {min_skipped}"
            );
        }
    }
}

#[test]
fn test_empty_input() {
    let mut input: Vec<Candidate<usize>> = Vec::new();
    assert!(select(&mut input, 8, &mut NoRandomness).is_empty());
}

#[test]
fn test_zero_capacity() {
    let mut input = candidates(&[0, 0, 1]);
    assert!(select(&mut input, 0, &mut NoRandomness).is_empty());
    assert_eq!(input, candidates(&[0, 0, 1]), "Weights must stay untouched.");
}

#[test]
fn test_capacity_covers_everyone_without_randomness() {
    let mut input = candidates(&[3, 0, 1, 0, 7]);
    let selected = select(&mut input, 5, &mut NoRandomness);
    assert_eq!(
        selected.into_iter().collect::<HashSet<_>>(),
        (0..5).collect::<HashSet<_>>()
    );

    let mut input = candidates(&[3, 0, 1]);
    assert_eq!(select(&mut input, 100, &mut NoRandomness).len(), 3);
}

#[test]
fn test_group_filling_capacity_exactly_is_admitted_whole() {
    let mut input = candidates(&[2, 0, 1, 0, 1]);
    let selected = select(&mut input, 4, &mut NoRandomness);
    // lowest weight first, input order within a group
    assert_eq!(selected, vec![1, 3, 2, 4]);
}

#[test]
fn test_boundary_group_is_sampled() {
    let weights = [0, 1, 1, 1, 1, 2];
    let mut rng = StdRng::seed_from_u64(17);

    for _ in 0..100 {
        let mut input = candidates(&weights);
        let selected = select(&mut input, 3, &mut rng);

        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0], 0, "The only zero-token candidate must come first.");
        assert!(
            selected[1..].iter().all(|&id| weights[id] == 1),
            "The remaining places must come from the boundary group: {selected:?}"
        );
        assert_ne!(selected[1], selected[2]);
    }
}

#[test]
fn test_selected_weights_are_bumped() {
    let mut input = candidates(&[0, 5, 0, 2]);
    let selected: HashSet<usize> = select(&mut input, 3, &mut NoRandomness)
        .into_iter()
        .collect();

    assert_eq!(selected, HashSet::from([0, 2, 3]));
    assert_eq!(input, candidates(&[1, 5, 1, 3]));
}

#[test]
fn test_duplicate_ids_are_considered_once() {
    let mut input = vec![
        Candidate::new('a', 0),
        Candidate::new('a', 0),
        Candidate::new('b', 1),
    ];
    let selected = select(&mut input, 3, &mut NoRandomness);
    assert_eq!(selected, vec!['a', 'b']);
}

#[test]
fn test_tie_is_broken_uniformly() {
    const TRIALS: usize = 10_000;
    let mut rng = StdRng::seed_from_u64(42);
    let mut wins: HashMap<&str, usize> = HashMap::new();

    for _ in 0..TRIALS {
        let mut input = vec![Candidate::new("alice", 3), Candidate::new("bob", 3)];
        let selected = select(&mut input, 1, &mut rng);
        assert_eq!(selected.len(), 1);
        *wins.entry(selected[0]).or_default() += 1;
    }

    // six standard deviations around the mean
    for user in ["alice", "bob"] {
        let count = wins.get(user).copied().unwrap_or(0);
        assert!(
            (4_700..=5_300).contains(&count),
            "{user} won {count} of {TRIALS} ties"
        );
    }
}

#[test]
fn test_boundary_members_are_equally_likely() {
    const TRIALS: usize = 12_000;
    let mut rng = StdRng::seed_from_u64(7);
    let mut wins = [0usize; 4];

    for _ in 0..TRIALS {
        let mut input = candidates(&[1, 1, 1, 1]);
        for id in select(&mut input, 2, &mut rng) {
            wins[id] += 1;
        }
    }

    // each member is chosen with probability 1/2
    for (id, &count) in wins.iter().enumerate() {
        assert!(
            (5_670..=6_330).contains(&count),
            "member {id} chosen {count} of {TRIALS} times"
        );
    }
}
