//! Progress sets and their range arithmetic.

use crate::error::{ParseError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A closed interval of applied transaction sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SeqRange {
    pub lo: u64,
    pub hi: u64,
}

impl SeqRange {
    /// A single sequence number.
    pub fn point(n: u64) -> Self {
        Self { lo: n, hi: n }
    }

    /// An inclusive interval. Callers guarantee `lo <= hi`; the parser
    /// rejects inverted input before it gets here.
    pub fn span(lo: u64, hi: u64) -> Self {
        debug_assert!(lo <= hi);
        Self { lo, hi }
    }

    /// Number of sequence numbers covered.
    pub fn len(&self) -> u64 {
        self.hi - self.lo + 1
    }
}

impl fmt::Display for SeqRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lo == self.hi {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "{}-{}", self.lo, self.hi)
        }
    }
}

/// Per-source replication progress: which sequence numbers each
/// originating server's transactions have reached this replica.
///
/// Ranges for a source are kept in minimal form at all times — sorted,
/// disjoint, and non-adjacent — so cardinality and union never double
/// count. Constructed fresh from each introspection query and discarded
/// when recovery finishes; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSet {
    sources: BTreeMap<String, Vec<SeqRange>>,
}

impl ProgressSet {
    /// The empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no source has any progress recorded.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Ranges recorded for one source, in minimal form.
    pub fn ranges(&self, source: &str) -> Option<&[SeqRange]> {
        self.sources.get(source).map(Vec::as_slice)
    }

    /// Iterates sources in order with their ranges.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SeqRange])> {
        self.sources.iter().map(|(s, r)| (s.as_str(), r.as_slice()))
    }

    /// Records a range for a source, coalescing with anything it touches.
    pub fn insert(&mut self, source: &str, range: SeqRange) {
        let ranges = self.sources.entry(source.to_string()).or_default();
        coalesce_into(ranges, range);
    }

    /// Semilattice join: the smallest set containing both inputs.
    ///
    /// Commutative, associative, and idempotent. Sources present on only
    /// one side pass through unchanged.
    pub fn union(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    /// In-place variant of [`ProgressSet::union`].
    pub fn merge(&mut self, other: &Self) {
        for (source, ranges) in &other.sources {
            for &range in ranges {
                self.insert(source, range);
            }
        }
    }

    /// Total count of distinct sequence numbers across all sources.
    pub fn cardinality(&self) -> u64 {
        self.sources
            .values()
            .flat_map(|ranges| ranges.iter())
            .map(SeqRange::len)
            .sum()
    }
}

impl FromStr for ProgressSet {
    type Err = ParseError;

    /// Parses wire text: comma-separated `source ':' range (':' range)*`
    /// clauses where `range` is `N` or `N-M` with `N <= M`.
    ///
    /// Empty input is the empty set; a clause with no ranges is dropped;
    /// any other irregularity is fatal.
    fn from_str(text: &str) -> Result<Self> {
        let mut set = Self::new();
        for clause in text.split(',') {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            let mut parts = clause.split(':');
            // split always yields at least one element
            let source = parts.next().unwrap_or("").trim();
            let tokens: Vec<&str> = parts.map(str::trim).collect();
            if tokens.is_empty() {
                // A bare source id carries no information.
                continue;
            }
            if source.is_empty() {
                return Err(ParseError::MissingSource { clause: clause.to_string() });
            }
            for token in tokens {
                set.insert(source, parse_range(source, token)?);
            }
        }
        Ok(set)
    }
}

impl fmt::Display for ProgressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (source, ranges) in &self.sources {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{source}")?;
            for range in ranges {
                write!(f, ":{range}")?;
            }
        }
        Ok(())
    }
}

/// Parses one `N` or `N-M` token.
fn parse_range(source: &str, token: &str) -> Result<SeqRange> {
    let bad = || ParseError::BadRange { source_id: source.to_string(), token: token.to_string() };
    match token.split_once('-') {
        Some((lo, hi)) => {
            let lo: u64 = parse_seq(lo).ok_or_else(bad)?;
            let hi: u64 = parse_seq(hi).ok_or_else(bad)?;
            if lo > hi {
                return Err(ParseError::InvertedRange { source_id: source.to_string(), lo, hi });
            }
            Ok(SeqRange::span(lo, hi))
        }
        None => parse_seq(token).map(SeqRange::point).ok_or_else(bad),
    }
}

fn parse_seq(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Inserts `range` into a minimal-form range list, keeping it minimal.
/// Overlapping and adjacent ranges collapse into one.
fn coalesce_into(ranges: &mut Vec<SeqRange>, range: SeqRange) {
    let mut out = Vec::with_capacity(ranges.len() + 1);
    let mut pending = Some(range);
    for &existing in ranges.iter() {
        match pending {
            Some(p) if existing.hi.saturating_add(1) < p.lo => out.push(existing),
            Some(p) if p.hi.saturating_add(1) < existing.lo => {
                out.push(p);
                out.push(existing);
                pending = None;
            }
            Some(p) => {
                pending =
                    Some(SeqRange { lo: existing.lo.min(p.lo), hi: existing.hi.max(p.hi) });
            }
            None => out.push(existing),
        }
    }
    if let Some(p) = pending {
        out.push(p);
    }
    *ranges = out;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ProgressSet {
        text.parse().unwrap()
    }

    fn ranges_of(set: &ProgressSet, source: &str) -> Vec<(u64, u64)> {
        set.ranges(source)
            .unwrap_or(&[])
            .iter()
            .map(|r| (r.lo, r.hi))
            .collect()
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("   ").is_empty());
    }

    #[test]
    fn test_parse_single_point() {
        let set = parse("foo:3");
        assert_eq!(ranges_of(&set, "foo"), vec![(3, 3)]);
    }

    #[test]
    fn test_parse_interval() {
        let set = parse("foo:2-4");
        assert_eq!(ranges_of(&set, "foo"), vec![(2, 4)]);
    }

    #[test]
    fn test_parse_orders_ranges() {
        let set = parse("foo:3-5:1");
        assert_eq!(ranges_of(&set, "foo"), vec![(1, 1), (3, 5)]);
    }

    #[test]
    fn test_parse_multiple_sources() {
        let set = parse("foo:4, bar:5-7:9-15");
        assert_eq!(ranges_of(&set, "foo"), vec![(4, 4)]);
        assert_eq!(ranges_of(&set, "bar"), vec![(5, 7), (9, 15)]);
    }

    #[test]
    fn test_parse_drops_bare_source() {
        assert!(parse("foo").is_empty());
        let set = parse("foo, bar:1");
        assert!(set.ranges("foo").is_none());
        assert_eq!(ranges_of(&set, "bar"), vec![(1, 1)]);
    }

    #[test]
    fn test_parse_rejects_garbage_tokens() {
        assert!(matches!(
            "foo:x".parse::<ProgressSet>(),
            Err(ParseError::BadRange { .. })
        ));
        assert!(matches!(
            "foo:1-2-3".parse::<ProgressSet>(),
            Err(ParseError::BadRange { .. })
        ));
        assert!(matches!(
            "foo:-4".parse::<ProgressSet>(),
            Err(ParseError::BadRange { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_inverted_range() {
        assert_eq!(
            "foo:5-3".parse::<ProgressSet>(),
            Err(ParseError::InvertedRange { source_id: "foo".to_string(), lo: 5, hi: 3 })
        );
    }

    #[test]
    fn test_parse_rejects_missing_source() {
        assert!(matches!(
            ":1-3".parse::<ProgressSet>(),
            Err(ParseError::MissingSource { .. })
        ));
    }

    #[test]
    fn test_union_recoalesces() {
        let merged = parse("foo:1:3-6").union(&parse("foo:3-6:1"));
        assert_eq!(ranges_of(&merged, "foo"), vec![(1, 1), (3, 6)]);
    }

    #[test]
    fn test_union_coalesces_adjacent() {
        let merged = parse("adjacent:1-5").union(&parse("adjacent:6-10"));
        assert_eq!(ranges_of(&merged, "adjacent"), vec![(1, 10)]);
    }

    #[test]
    fn test_union_coalesces_overlap() {
        let merged = parse("s:1-7").union(&parse("s:4-12:20"));
        assert_eq!(ranges_of(&merged, "s"), vec![(1, 12), (20, 20)]);
    }

    #[test]
    fn test_union_passes_through_disjoint_sources() {
        let merged = parse("foo:1-3").union(&parse("bar:9"));
        assert_eq!(ranges_of(&merged, "foo"), vec![(1, 3)]);
        assert_eq!(ranges_of(&merged, "bar"), vec![(9, 9)]);
    }

    #[test]
    fn test_cardinality() {
        assert_eq!(parse("foo:1-3:6-10, bar:4:7").cardinality(), 10);
        assert_eq!(ProgressSet::new().cardinality(), 0);
    }

    #[test]
    fn test_display_round_trips_shape() {
        let set = parse("bar:5-7:9, foo:4");
        assert_eq!(set.to_string(), "bar:5-7:9,foo:4");
    }
}
