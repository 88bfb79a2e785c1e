//! Replication-progress set algebra.
//!
//! Each replica reports which transaction sequence numbers it has applied or
//! received as a text set like `"src-a:1-40:42, src-b:1-17"`. This crate
//! parses that wire text into a [`ProgressSet`], merges sets with a
//! semilattice [`ProgressSet::union`], measures them with
//! [`ProgressSet::cardinality`], and selects the node a broken cluster
//! should be re-seeded from with [`most_recent_node`].

mod error;
mod set;

pub use error::{ParseError, Result};
pub use set::{ProgressSet, SeqRange};

use faultline_types::NodeId;
use std::collections::BTreeMap;

/// Picks the node whose progress set knows the most distinct transactions.
///
/// "Most recent" is measured by [`ProgressSet::cardinality`], not by how far
/// any individual range reaches: a node holding `1-8` beats a node holding
/// `10-12`, because it has seen eight transactions to the other's three.
/// The name is kept for continuity with the replication literature even
/// though counting, not position, decides.
///
/// Ties are broken by lexicographically smallest node id. The tie-break is
/// deliberate: letting map iteration order decide would make recovery pick
/// different primaries on identical inputs.
///
/// Returns `None` only for an empty map.
pub fn most_recent_node(sets: &BTreeMap<NodeId, ProgressSet>) -> Option<NodeId> {
    let mut best: Option<(&NodeId, u64)> = None;
    for (node, set) in sets {
        let card = set.cardinality();
        match best {
            // Strict comparison: on a tie the earlier (smaller) id stands.
            Some((_, best_card)) if card <= best_card => {}
            _ => best = Some((node, card)),
        }
    }
    best.map(|(node, _)| node.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ProgressSet {
        text.parse().unwrap()
    }

    #[test]
    fn test_most_recent_counts_not_positions() {
        let mut sets = BTreeMap::new();
        sets.insert(NodeId::from("n1"), parse("foo:10-12"));
        sets.insert(NodeId::from("n2"), parse("foo:1-8"));
        // n1 reaches further (12 > 8) but n2 has seen more transactions.
        assert_eq!(most_recent_node(&sets), Some(NodeId::from("n2")));
    }

    #[test]
    fn test_most_recent_tie_breaks_to_smallest_id() {
        let mut sets = BTreeMap::new();
        sets.insert(NodeId::from("n2"), parse("foo:1-5"));
        sets.insert(NodeId::from("n1"), parse("bar:11-15"));
        sets.insert(NodeId::from("n3"), parse("foo:1-4"));
        assert_eq!(most_recent_node(&sets), Some(NodeId::from("n1")));
    }

    #[test]
    fn test_most_recent_of_empty_map() {
        assert_eq!(most_recent_node(&BTreeMap::new()), None);
    }

    #[test]
    fn test_most_recent_with_all_empty_sets() {
        let mut sets = BTreeMap::new();
        sets.insert(NodeId::from("n2"), ProgressSet::new());
        sets.insert(NodeId::from("n1"), ProgressSet::new());
        assert_eq!(most_recent_node(&sets), Some(NodeId::from("n1")));
    }
}
