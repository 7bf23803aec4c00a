//! A byte buffer keyed by the address [`Range`] it covers, with
//! overlap-tolerant merging.
//!
//! Grounded on the `Response` class in the reference implementation's
//! `frames.py`.

use crate::range::Range;
use crate::{Error, Result};

/// Bytes answered by the device for a particular [`Range`] of addresses.
#[derive(Debug, Clone)]
pub struct Response {
    /// The range this response's bytes cover.
    pub range: Range,
    data: Vec<u8>,
}

impl Response {
    /// Pairs `data` with the `range` it covers.
    pub fn new(range: Range, data: Vec<u8>) -> Result<Self> {
        if data.len() as i64 != range.len {
            return Err(Error::LengthMismatch(data.len(), range.len as usize));
        }
        Ok(Self { range, data })
    }

    /// Reads the bytes covering `sub`, which must be wholly inside
    /// [`range`](Response::range).
    pub fn get(&self, sub: Range) -> Result<&[u8]> {
        if sub.is_empty() {
            return Ok(&[]);
        }
        if !self.range.contains(&sub) {
            return Err(Error::OutOfRange(sub, self.range));
        }
        let start = (sub.start - self.range.start) as usize;
        Ok(&self.data[start..start + sub.len as usize])
    }

    /// Overwrites the bytes covering `sub`, which must be wholly inside
    /// [`range`](Response::range) and exactly as long as `sub`.
    pub fn set(&mut self, sub: Range, bytes: &[u8]) -> Result<()> {
        if sub.is_empty() {
            return Ok(());
        }
        if bytes.len() as i64 != sub.len {
            return Err(Error::LengthMismatch(bytes.len(), sub.len as usize));
        }
        if !self.range.contains(&sub) {
            return Err(Error::OutOfRange(sub, self.range));
        }
        let start = (sub.start - self.range.start) as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Extends this response in place with `other`, which must be
    /// mergeable (overlapping, touching, or either empty). Bytes in the
    /// overlap that disagree keep `self`'s value; a mismatch is logged.
    pub fn merge_with(&mut self, other: &Response) -> Result<()> {
        let overlap = self.range.intersection(&other.range);
        if !overlap.is_empty() {
            let ours = self.get(overlap)?;
            let theirs = other.get(overlap)?;
            if ours != theirs {
                log::warn!(
                    "overlapping data disagrees in range {overlap:?}; keeping the first reading"
                );
            }
        }

        let merged = self.range.union(&other.range)?;

        if other.range.contains(&self.range) && self.range != other.range {
            // self sits wholly inside other: keep our bytes, splice in
            // other's bytes on either side.
            let left = (self.range.start - other.range.start) as usize;
            let right = (other.range.end() - self.range.end()) as usize;
            let mut data = other.data[..left].to_vec();
            data.extend_from_slice(&self.data);
            data.extend_from_slice(&other.data[other.data.len() - right..]);
            self.data = data;
        } else if self.range.contains(&other.range) {
            // other sits wholly inside (or equals) self: nothing to splice.
        } else if self.range.start < other.range.start {
            let tail_start = (self.range.end() + 1 - other.range.start) as usize;
            self.data.extend_from_slice(&other.data[tail_start..]);
        } else if self.range.end() > other.range.end() {
            let head_len = (self.range.start - other.range.start) as usize;
            let mut data = other.data[..head_len].to_vec();
            data.extend_from_slice(&self.data);
            self.data = data;
        } else {
            unreachable!("mergeable, non-containing ranges must extend one way or the other");
        }

        self.range = merged;
        Ok(())
    }

    /// Sorts and merges a batch of answers, leaving disjoint,
    /// non-adjacent spans as separate responses.
    pub fn merge(answers: Vec<Response>) -> Vec<Response> {
        let mut sorted = answers;
        sorted.sort_by_key(|a| a.range.start);
        let mut out: Vec<Response> = Vec::with_capacity(sorted.len());
        for answer in sorted {
            match out.last_mut() {
                Some(last) if last.range.is_mergeable(&answer.range) => {
                    last.merge_with(&answer).expect("checked mergeable");
                }
                _ => out.push(answer),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set_roundtrip() {
        let mut r = Response::new(Range::new(10, 4).unwrap(), vec![1, 2, 3, 4]).unwrap();
        assert_eq!(r.get(Range::new(11, 2).unwrap()).unwrap(), &[2, 3]);
        r.set(Range::new(11, 2).unwrap(), &[9, 9]).unwrap();
        assert_eq!(r.get(Range::new(10, 4).unwrap()).unwrap(), &[1, 9, 9, 4]);
    }

    #[test]
    fn out_of_range_get_fails() {
        let r = Response::new(Range::new(10, 4).unwrap(), vec![1, 2, 3, 4]).unwrap();
        assert!(r.get(Range::new(20, 1).unwrap()).is_err());
    }

    #[test]
    fn merge_touching_responses() {
        let mut a = Response::new(Range::new(0, 2).unwrap(), vec![1, 2]).unwrap();
        let b = Response::new(Range::new(2, 2).unwrap(), vec![3, 4]).unwrap();
        a.merge_with(&b).unwrap();
        assert_eq!(a.range, Range::new(0, 4).unwrap());
        assert_eq!(a.get(Range::new(0, 4).unwrap()).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn merge_overlapping_keeps_first() {
        let mut a = Response::new(Range::new(0, 3).unwrap(), vec![1, 2, 3]).unwrap();
        let b = Response::new(Range::new(1, 3).unwrap(), vec![9, 9, 9]).unwrap();
        a.merge_with(&b).unwrap();
        assert_eq!(a.get(Range::new(0, 4).unwrap()).unwrap(), &[1, 2, 3, 9]);
    }

    #[test]
    fn merge_static_sorts_and_coalesces() {
        let answers = vec![
            Response::new(Range::new(4, 2).unwrap(), vec![5, 6]).unwrap(),
            Response::new(Range::new(0, 4).unwrap(), vec![1, 2, 3, 4]).unwrap(),
        ];
        let merged = Response::merge(answers);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].get(Range::new(0, 6).unwrap()).unwrap(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn merge_disjoint_stays_separate() {
        let answers = vec![
            Response::new(Range::new(0, 2).unwrap(), vec![1, 2]).unwrap(),
            Response::new(Range::new(10, 2).unwrap(), vec![3, 4]).unwrap(),
        ];
        assert_eq!(Response::merge(answers).len(), 2);
    }
}
