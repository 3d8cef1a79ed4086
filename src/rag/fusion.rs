//! Reciprocal Rank Fusion: score = Σ 1/(k + rank)
//!
//! Merges ranked lists without normalising their scores. Ranks are 1-based,
//! so the top item of a list contributes `1/(k + 1)`. Items with equal fused
//! scores keep the order in which they were first seen across the lists.

use std::collections::HashMap;
use std::hash::Hash;

/// Smoothing constant used for all fused retrieval
pub const RRF_K: f32 = 60.0;

/// Contribution of one list position to the fused score
pub fn rrf_contribution(rank: usize, k: f32) -> f32 {
    1.0 / (k + rank as f32)
}

/// Fuse ranked lists of ids, best first.
pub fn reciprocal_rank_fusion<K>(lists: &[Vec<K>], k: f32) -> Vec<(K, f32)>
where
    K: Eq + Hash + Clone,
{
    let mut order: Vec<K> = Vec::new();
    let mut scores: HashMap<K, f32> = HashMap::new();

    for list in lists {
        for (idx, id) in list.iter().enumerate() {
            let contribution = rrf_contribution(idx + 1, k);
            match scores.get_mut(id) {
                Some(score) => *score += contribution,
                None => {
                    scores.insert(id.clone(), contribution);
                    order.push(id.clone());
                }
            }
        }
    }

    let mut fused: Vec<(K, f32)> = order
        .into_iter()
        .map(|id| {
            let score = scores[&id];
            (id, score)
        })
        .collect();

    // sort_by is stable, ties stay in first-seen order
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_item_in_both_lists() {
        let dense = vec!["a", "b", "c"];
        let sparse = vec!["c", "a"];
        let fused = reciprocal_rank_fusion(&[dense, sparse], RRF_K);

        let a = fused.iter().find(|(id, _)| *id == "a").unwrap().1;
        let c = fused.iter().find(|(id, _)| *id == "c").unwrap().1;
        let b = fused.iter().find(|(id, _)| *id == "b").unwrap().1;

        assert!(close(a, 1.0 / 61.0 + 1.0 / 62.0));
        assert!(close(c, 1.0 / 63.0 + 1.0 / 61.0));
        assert!(close(b, 1.0 / 62.0));
        assert_eq!(fused[0].0, "a");
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let fused = reciprocal_rank_fusion(&[vec!["x"], vec!["y"]], RRF_K);
        assert_eq!(fused[0].0, "x");
        assert_eq!(fused[1].0, "y");
        assert!(close(fused[0].1, fused[1].1));
    }

    #[test]
    fn test_empty_lists() {
        let fused: Vec<(u32, f32)> = reciprocal_rank_fusion(&[vec![], vec![]], RRF_K);
        assert!(fused.is_empty());
    }

    #[quickcheck]
    fn prop_two_list_scores(r1: u8, r2: u8) -> bool {
        let r1 = (r1 % 20) as usize + 1;
        let r2 = (r2 % 20) as usize + 1;

        // target id 0 sits at rank r1 in the first list and r2 in the second
        let mut first: Vec<u32> = (1..r1 as u32).map(|i| 1000 + i).collect();
        first.push(0);
        let mut second: Vec<u32> = (1..r2 as u32).map(|i| 2000 + i).collect();
        second.push(0);
        second.push(3000);

        let fused = reciprocal_rank_fusion(&[first, second], RRF_K);
        let both = fused.iter().find(|(id, _)| *id == 0).unwrap().1;
        let only_second = fused.iter().find(|(id, _)| *id == 3000).unwrap().1;

        close(both, 1.0 / (60.0 + r1 as f32) + 1.0 / (60.0 + r2 as f32))
            && close(only_second, 1.0 / (60.0 + (r2 + 1) as f32))
    }

    #[quickcheck]
    fn prop_scores_non_increasing(a: Vec<u8>, b: Vec<u8>) -> bool {
        let dedup = |v: Vec<u8>| {
            let mut seen = std::collections::HashSet::new();
            v.into_iter().filter(|x| seen.insert(*x)).collect::<Vec<_>>()
        };
        let fused = reciprocal_rank_fusion(&[dedup(a), dedup(b)], RRF_K);
        fused.windows(2).all(|w| w[0].1 >= w[1].1)
    }
}
