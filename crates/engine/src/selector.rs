//! Campaign selection over the eligible list: uniform at random, O(1),
//! reproducible under a fixed seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, Default)]
pub struct Selector {
    seed: Option<u64>,
}

impl Selector {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    /// Pick one id from the eligible list. A single candidate skips
    /// the RNG entirely.
    pub fn pick<'a>(&self, eligible: &'a [String]) -> Option<&'a str> {
        match eligible {
            [] => None,
            [only] => Some(only.as_str()),
            many => {
                let mut rng = match self.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                many.choose(&mut rng).map(String::as_str)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_list_yields_none() {
        assert_eq!(Selector::new(None).pick(&[]), None);
    }

    #[test]
    fn single_candidate_is_always_chosen() {
        let eligible = ids(&["c1"]);
        assert_eq!(Selector::new(None).pick(&eligible), Some("c1"));
    }

    #[test]
    fn pick_is_deterministic_under_fixed_seed() {
        let eligible = ids(&["c1", "c2", "c3", "c4", "c5"]);
        let selector = Selector::new(Some(42));
        let first = selector.pick(&eligible).map(str::to_string);
        for _ in 0..50 {
            assert_eq!(selector.pick(&eligible).map(str::to_string), first);
        }
    }

    #[test]
    fn pick_never_leaves_the_candidate_list() {
        let eligible = ids(&["c1", "c2", "c3"]);
        for seed in 0..200 {
            let chosen = Selector::new(Some(seed)).pick(&eligible).unwrap();
            assert!(eligible.iter().any(|id| id == chosen));
        }
    }

    #[test]
    fn unseeded_pick_reaches_every_candidate() {
        let eligible = ids(&["c1", "c2", "c3"]);
        let selector = Selector::new(None);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(selector.pick(&eligible).unwrap().to_string());
        }
        assert_eq!(seen.len(), eligible.len());
    }
}
