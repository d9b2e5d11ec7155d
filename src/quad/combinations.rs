//! Brightest-first combination iterator.
//!
//! Yields K-combinations of positions `0..n` ordered by the sum of the
//! selected positions. Star lists are sorted brightest-first before quads are
//! built, so combinations made of the brightest stars come out first.
//!
//! Implementation: min-heap keyed by position sum, with a HashSet for dedup.
//! Ties on the sum are broken lexicographically, which keeps the sequence
//! fully deterministic.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

/// Iterator over all `[usize; K]` strictly increasing position tuples below `n`,
/// in order of increasing position sum.
pub struct BrightestFirstCombinations<const K: usize> {
    n: usize,
    heap: BinaryHeap<Reverse<(usize, [usize; K])>>,
    seen: HashSet<[usize; K]>,
}

impl<const K: usize> BrightestFirstCombinations<K> {
    pub fn new(n: usize) -> Self {
        let mut it = Self {
            n,
            heap: BinaryHeap::new(),
            seen: HashSet::new(),
        };
        if K > 0 && n >= K {
            let initial: [usize; K] = std::array::from_fn(|i| i);
            it.seen.insert(initial);
            it.heap.push(Reverse((initial.iter().sum(), initial)));
        }
        it
    }
}

impl<const K: usize> Iterator for BrightestFirstCombinations<K> {
    type Item = [usize; K];

    fn next(&mut self) -> Option<[usize; K]> {
        let Reverse((_, combo)) = self.heap.pop()?;

        // Successors: bump one position by 1 while keeping the tuple strictly increasing.
        for i in 0..K {
            let next_val = combo[i] + 1;
            let upper = if i + 1 < K { combo[i + 1] } else { self.n };
            if next_val < upper {
                let mut successor = combo;
                successor[i] = next_val;
                if self.seen.insert(successor) {
                    self.heap
                        .push(Reverse((successor.iter().sum(), successor)));
                }
            }
        }

        Some(combo)
    }
}

/// Number of K-combinations of n items.
#[cfg(test)]
fn n_choose_k(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let mut result = 1usize;
    for i in 0..k {
        result = result * (n - i) / (i + 1);
    }
    result
}
