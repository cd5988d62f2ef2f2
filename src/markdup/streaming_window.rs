use std::collections::BTreeMap;

use crate::{hts::record::AlignmentRecord, utils::errors::Error};

use super::duplicate_set::DuplicateSetKey;

/// Where an incoming record sits relative to the current reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    SameReference,
    NewReference(usize),
    /// First unmapped record without a reference; everything before it may be closed.
    Unplaced,
}

/**
 * Minimum-distance window over one reference at a time. Tracks the greatest soft-clip-adjusted
 * unclipped start seen so far; everything anchored before `max_start - minimum_distance` can no
 * longer gain members and is released in anchor order.
 */
#[derive(Debug)]
pub struct StreamingWindow {
    minimum_distance: i64,
    reference_index: Option<usize>,
    last_alignment_start: i64,
    max_unclipped_start: Option<i64>,
    seen_unplaced: bool,

    open: BTreeMap<(i64, u64), DuplicateSetKey>,
    seq: u64,
}

impl StreamingWindow {
    pub fn new(minimum_distance: i64) -> Self {
        Self {
            minimum_distance,
            reference_index: None,
            last_alignment_start: i64::MIN,
            max_unclipped_start: None,
            seen_unplaced: false,
            open: BTreeMap::new(),
            seq: 0,
        }
    }

    pub fn minimum_distance(&self) -> i64 {
        self.minimum_distance
    }

    pub fn reference_index(&self) -> Option<usize> {
        self.reference_index
    }

    /// Checks the coordinate sort order of `rec` and reports whether it starts a new reference.
    pub fn check_sorted(&mut self, rec: &AlignmentRecord) -> Result<Advance, Error> {
        let reference_index = match rec.reference_index {
            Some(r) => r,
            None => {
                let first = !self.seen_unplaced;
                self.seen_unplaced = true;
                return Ok(if first { Advance::Unplaced } else { Advance::SameReference });
            }
        };

        if self.seen_unplaced {
            Err(Error::unsorted(
                &rec.name,
                "placed record found after unplaced unmapped records",
            ))?
        }

        match self.reference_index {
            Some(current) if reference_index < current => Err(Error::unsorted(
                &rec.name,
                format!("reference {} found after reference {}", reference_index, current),
            )),
            Some(current) if reference_index == current => {
                if rec.alignment_start < self.last_alignment_start {
                    Err(Error::unsorted(
                        &rec.name,
                        format!(
                            "alignment start {} found after {} on reference {}",
                            rec.alignment_start, self.last_alignment_start, current
                        ),
                    ))?
                }
                self.last_alignment_start = rec.alignment_start;
                Ok(Advance::SameReference)
            }
            _ => Ok(Advance::NewReference(reference_index)),
        }
    }

    /// Resets the per-reference state. Open keys must have been drained before.
    pub fn start_reference(&mut self, reference_index: usize, alignment_start: i64) {
        self.reference_index = Some(reference_index);
        self.last_alignment_start = alignment_start;
        self.max_unclipped_start = None;
    }

    pub fn floor(&self) -> Option<i64> {
        self.max_unclipped_start
            .map(|max| max.saturating_sub(self.minimum_distance))
    }

    /// Whether the floor has moved past `position`.
    pub fn is_passed(&self, position: i64) -> bool {
        matches!(self.floor(), Some(floor) if floor > position)
    }

    /// Checks `unclipped_start` against the floor and then advances the window with it.
    pub fn observe(&mut self, read_name: &str, unclipped_start: i64) -> Result<(), Error> {
        if let (Some(max), Some(floor)) = (self.max_unclipped_start, self.floor()) {
            if unclipped_start < floor {
                Err(Error::WindowInvariantViolation {
                    read_name: read_name.to_string(),
                    reference_index: self.reference_index.unwrap_or_default(),
                    unclipped_start,
                    floor,
                    required: max - unclipped_start,
                    minimum_distance: self.minimum_distance,
                })?
            }
        }

        self.max_unclipped_start = Some(
            self.max_unclipped_start
                .map_or(unclipped_start, |max| max.max(unclipped_start)),
        );

        Ok(())
    }

    pub fn track(&mut self, key: DuplicateSetKey, anchor: i64) {
        self.open.insert((anchor, self.seq), key);
        self.seq += 1;
    }

    /// Next key whose anchor has fallen behind the floor, lowest anchor first.
    pub fn pop_ready(&mut self) -> Option<(i64, DuplicateSetKey)> {
        let floor = self.floor()?;

        let (&(anchor, seq), _) = self.open.first_key_value()?;
        if anchor >= floor {
            return None;
        }

        self.open.remove(&(anchor, seq)).map(|key| (anchor, key))
    }

    /// Every tracked key in anchor order, ties in tracking order.
    pub fn drain_all(&mut self) -> Vec<(i64, DuplicateSetKey)> {
        std::mem::take(&mut self.open)
            .into_iter()
            .map(|((anchor, _), key)| (anchor, key))
            .collect()
    }

    pub fn open_keys(&self) -> usize {
        self.open.len()
    }
}
