//! Half-open... no, closed: `[start, start+len)` integer interval algebra
//! over device memory addresses.
//!
//! Grounded directly on the `Range` class in the Python reference
//! implementation's `parameters.py`: a start/length pair (rather than
//! start/end) because every wire frame is itself phrased that way (an
//! offset and a byte count).

use crate::{Error, Result};

/// A contiguous span of `len` addresses starting at `start`.
///
/// `len == 0` denotes the empty range; an empty range's `start` is not
/// significant and is ignored by [`PartialEq`], [`contains`](Range::contains)
/// and the set operations below — it is absorbed into, and contained by,
/// every other range regardless of where it happens to sit.
#[derive(Debug, Clone, Copy)]
pub struct Range {
    /// First address in the range.
    pub start: i64,
    /// Number of addresses in the range.
    pub len: i64,
}

impl Range {
    /// Builds a range, validating that `len` is non-negative.
    pub fn new(start: i64, len: i64) -> Result<Self> {
        if len < 0 {
            return Err(Error::InvalidRange(format!("{start}-{len}")));
        }
        Ok(Self { start, len })
    }

    /// The empty range. Its `start` is arbitrary.
    pub fn empty() -> Self {
        Self { start: 0, len: 0 }
    }

    /// Last address covered by this range (`start + len - 1`).
    ///
    /// For an empty range this is `start - 1`, which is only ever used as
    /// an intermediate value in the set operations below — never read as
    /// a "real" address.
    pub fn end(&self) -> i64 {
        self.start + self.len - 1
    }

    /// True when `len == 0`.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when `other` is wholly inside `self`.
    ///
    /// An empty `other` is always contained. An empty `self` contains
    /// nothing but another empty range.
    pub fn contains(&self, other: &Range) -> bool {
        if other.is_empty() {
            return true;
        }
        !self.is_empty() && self.start <= other.start && self.end() >= other.end()
    }

    /// True when `self` and `other` overlap, touch, or either is empty —
    /// i.e. when [`union`](Range::union) would succeed.
    pub fn is_mergeable(&self, other: &Range) -> bool {
        if self.is_empty() || other.is_empty() {
            return true;
        }
        self.start <= other.end() + 1 && other.start <= self.end() + 1
    }

    /// The overlap between `self` and `other`, or the empty range if they
    /// don't overlap.
    pub fn intersection(&self, other: &Range) -> Range {
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        if end < start {
            Range::empty()
        } else {
            Range {
                start,
                len: end - start + 1,
            }
        }
    }

    /// The smallest range covering both `self` and `other`.
    ///
    /// Fails with [`Error::NotMergeable`] when the two ranges are disjoint
    /// and not even adjacent (there would be a gap, so no single `Range`
    /// can represent the union).
    pub fn union(&self, other: &Range) -> Result<Range> {
        if self.is_empty() {
            return Ok(*other);
        }
        if other.is_empty() {
            return Ok(*self);
        }
        if !self.is_mergeable(other) {
            return Err(Error::NotMergeable(*self, *other));
        }
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        Ok(Range {
            start,
            len: end - start + 1,
        })
    }

    /// `self` with `other` carved out, as zero, one, or two ranges.
    pub fn subtract(&self, other: &Range) -> Vec<Range> {
        if self.is_empty() {
            return vec![];
        }
        let mut pieces = Vec::with_capacity(2);
        if self.start < other.start {
            let len = (other.start - self.start).min(self.len);
            pieces.push(Range {
                start: self.start,
                len,
            });
        }
        if self.end() > other.end() {
            let start = self.start.max(other.end() + 1);
            pieces.push(Range {
                start,
                len: self.end() - start + 1,
            });
        }
        pieces
    }

    /// Parses a 1-based `"N"` (single address) or `"N-M"` (inclusive span)
    /// string into a 0-based range, the grammar used on the CLI for
    /// `address get`/`address set`.
    pub fn from_cli_str(s: &str) -> Result<Range> {
        let invalid = || Error::InvalidRange(s.to_string());
        let mut parts = s.splitn(2, '-');
        let first: i64 = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        match parts.next() {
            None => {
                if first < 1 {
                    return Err(invalid());
                }
                Range::new(first - 1, 1)
            }
            Some(rest) => {
                let last: i64 = rest.parse().map_err(|_| invalid())?;
                if first < 1 || last < first {
                    return Err(invalid());
                }
                Range::new(first - 1, last - first + 1)
            }
        }
    }

    /// Sorts and merges a set of ranges into the minimal equivalent set of
    /// disjoint, non-adjacent ranges.
    pub fn coalesce(ranges: &[Range]) -> Vec<Range> {
        let mut sorted: Vec<Range> = ranges.iter().copied().filter(|r| !r.is_empty()).collect();
        sorted.sort_by_key(|r| r.start);
        let mut out: Vec<Range> = Vec::with_capacity(sorted.len());
        for r in sorted {
            match out.last_mut() {
                Some(last) if last.is_mergeable(&r) => {
                    *last = last.union(&r).expect("checked mergeable");
                }
                _ => out.push(r),
            }
        }
        out
    }
}

impl PartialEq for Range {
    fn eq(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            self.is_empty() && other.is_empty()
        } else {
            self.start == other.start && self.len == other.len
        }
    }
}

impl Eq for Range {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ranges_are_equal_regardless_of_start() {
        assert_eq!(Range::new(5, 0).unwrap(), Range::new(99, 0).unwrap());
    }

    #[test]
    fn contains_absorbs_empty_other() {
        let r = Range::new(10, 5).unwrap();
        assert!(r.contains(&Range::new(1000, 0).unwrap()));
    }

    #[test]
    fn union_of_touching_ranges() {
        let a = Range::new(0, 2).unwrap();
        let b = Range::new(2, 3).unwrap();
        assert_eq!(a.union(&b).unwrap(), Range::new(0, 5).unwrap());
    }

    #[test]
    fn union_of_disjoint_ranges_fails() {
        let a = Range::new(0, 2).unwrap();
        let b = Range::new(5, 2).unwrap();
        assert!(a.union(&b).is_err());
    }

    #[test]
    fn subtract_middle_leaves_two_pieces() {
        let r = Range::new(0, 10).unwrap();
        let hole = Range::new(3, 2).unwrap();
        assert_eq!(
            r.subtract(&hole),
            vec![Range::new(0, 3).unwrap(), Range::new(5, 5).unwrap()]
        );
    }

    #[test]
    fn subtract_covering_whole_range() {
        let r = Range::new(2, 3).unwrap();
        assert_eq!(r.subtract(&Range::new(0, 10).unwrap()), vec![]);
    }

    #[test]
    fn from_cli_str_single_and_span() {
        assert_eq!(Range::from_cli_str("1").unwrap(), Range::new(0, 1).unwrap());
        assert_eq!(Range::from_cli_str("1-3").unwrap(), Range::new(0, 3).unwrap());
        assert!(Range::from_cli_str("3-1").is_err());
        assert!(Range::from_cli_str("0").is_err());
    }

    #[test]
    fn coalesce_merges_and_sorts() {
        let ranges = vec![
            Range::new(10, 2).unwrap(),
            Range::new(0, 3).unwrap(),
            Range::new(2, 8).unwrap(),
        ];
        assert_eq!(Range::coalesce(&ranges), vec![Range::new(0, 12).unwrap()]);
    }

    #[test]
    fn coalesce_keeps_disjoint_ranges_separate() {
        let ranges = vec![Range::new(0, 2).unwrap(), Range::new(10, 2).unwrap()];
        assert_eq!(
            Range::coalesce(&ranges),
            vec![Range::new(0, 2).unwrap(), Range::new(10, 2).unwrap()]
        );
    }
}
