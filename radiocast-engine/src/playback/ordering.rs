//! Item ordering policies
//!
//! The catalog already returns items by ascending rank, so ascending is the
//! identity, descending reverses and random shuffles uniformly.

use rand::seq::SliceRandom;
use radiocast_common::events::OrderPolicy;

pub fn order_items<T>(mut items: Vec<T>, policy: OrderPolicy) -> Vec<T> {
    match policy {
        OrderPolicy::Ascending => {}
        OrderPolicy::Descending => items.reverse(),
        OrderPolicy::Random => items.shuffle(&mut rand::thread_rng()),
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ascending_is_identity() {
        assert_eq!(order_items(vec![1, 2, 3], OrderPolicy::Ascending), vec![1, 2, 3]);
    }

    #[test]
    fn descending_reverses() {
        assert_eq!(order_items(vec![1, 2, 3], OrderPolicy::Descending), vec![3, 2, 1]);
    }

    #[test]
    fn random_reaches_every_permutation() {
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            let ordered = order_items(vec![1, 2, 3], OrderPolicy::Random);
            let mut sorted = ordered.clone();
            sorted.sort();
            assert_eq!(sorted, vec![1, 2, 3]);
            seen.insert(ordered);
            if seen.len() == 6 {
                break;
            }
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn empty_and_single_inputs() {
        assert!(order_items(Vec::<u32>::new(), OrderPolicy::Random).is_empty());
        assert_eq!(order_items(vec![9], OrderPolicy::Descending), vec![9]);
    }
}
