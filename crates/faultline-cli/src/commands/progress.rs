//! Progress command - operator-facing progress-set debugging.

use anyhow::{Context, Result, bail};
use faultline_progress::{ProgressSet, most_recent_node};
use faultline_types::NodeId;
use std::collections::BTreeMap;

/// Parses and unions progress-set texts.
///
/// Two input shapes:
/// - bare texts: all sets are unioned and measured;
/// - `node=text` pairs: additionally reports the node a recovery would
///   re-seed from.
pub fn run(sets: &[String]) -> Result<()> {
    let named = sets.iter().all(|s| s.contains('='));
    if named {
        run_named(sets)
    } else if sets.iter().any(|s| s.contains('=')) {
        bail!("mix of bare texts and node=text pairs; pick one shape");
    } else {
        run_union(sets)
    }
}

fn run_union(sets: &[String]) -> Result<()> {
    let mut total = ProgressSet::new();
    for text in sets {
        let set: ProgressSet =
            text.parse().with_context(|| format!("Failed to parse {text:?}"))?;
        total.merge(&set);
    }
    print_set(&total);
    Ok(())
}

fn run_named(sets: &[String]) -> Result<()> {
    let mut by_node = BTreeMap::new();
    for pair in sets {
        let (node, text) = pair.split_once('=').expect("checked by caller");
        let set: ProgressSet =
            text.parse().with_context(|| format!("Failed to parse set for {node:?}"))?;
        by_node.insert(NodeId::from(node), set);
    }

    for (node, set) in &by_node {
        println!("{node}: cardinality {}", set.cardinality());
    }
    match most_recent_node(&by_node) {
        Some(node) => println!("re-seed from: {node}"),
        None => println!("re-seed from: (no nodes)"),
    }
    Ok(())
}

fn print_set(set: &ProgressSet) {
    if set.is_empty() {
        println!("(empty set)");
        return;
    }
    for (source, ranges) in set.iter() {
        let rendered: Vec<String> = ranges.iter().map(ToString::to_string).collect();
        println!("  {source}: {}", rendered.join(", "));
    }
    println!("cardinality: {}", set.cardinality());
}
