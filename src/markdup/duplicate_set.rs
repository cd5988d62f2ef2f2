use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt::Display,
};

use serde::Serialize;

use crate::{
    hts::{duplicate_scoring_strategy::CandidateScore, record::AlignmentRecord},
    utils::errors::Error,
};

use super::{
    coordinate_resolver::ResolvedPosition, utils::physical_location::PhysicalLocationInt,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum KeyShape {
    Fragment,
    PairedBothMapped,
    PairedMateUnmapped,
}

/**
 * Identity of a duplicate set. The two ends of a pair are stored in canonical order, so both ends
 * of a pair and every duplicate of that pair produce equal keys.
 */
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DuplicateSetKey {
    pub library_id: i16,
    pub first: ResolvedPosition,
    pub second: Option<ResolvedPosition>,
    pub shape: KeyShape,
}

impl DuplicateSetKey {
    pub fn fragment(library_id: i16, end: ResolvedPosition) -> Self {
        Self {
            library_id,
            first: end,
            second: None,
            shape: KeyShape::Fragment,
        }
    }

    pub fn mate_unmapped(library_id: i16, end: ResolvedPosition) -> Self {
        Self {
            library_id,
            first: end,
            second: None,
            shape: KeyShape::PairedMateUnmapped,
        }
    }

    pub fn pair(library_id: i16, a: ResolvedPosition, b: ResolvedPosition) -> Self {
        let (first, second) = if b.sort_key() < a.sort_key() { (b, a) } else { (a, b) };

        Self {
            library_id,
            first,
            second: Some(second),
            shape: KeyShape::PairedBothMapped,
        }
    }

    /// Greatest 5' coordinate among the ends lying on `reference_index`.
    pub fn anchor_on(&self, reference_index: usize) -> Option<i64> {
        [Some(self.first), self.second]
            .into_iter()
            .flatten()
            .filter(|end| end.reference_index == reference_index)
            .map(|end| end.coordinate)
            .max()
    }
}

impl Display for DuplicateSetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[library={} {}", self.shape, self.library_id, self.first)?;
        if let Some(second) = &self.second {
            write!(f, " {}", second)?;
        }
        write!(f, "]")
    }
}

/// One fragment or read pair competing for representative of its duplicate set.
#[derive(Clone, Debug, PartialEq)]
pub struct DuplicateCandidate {
    pub name: String,
    /// Input ordinals of the records of this candidate seen so far (one or two).
    pub ordinals: Vec<u64>,
    pub paired: bool,
    /// Where the mate record sorts, when that is after the first end. Such a mate may still arrive
    /// after the set closed.
    pub expected_mate: Option<(usize, i64)>,
    pub score: CandidateScore,
    pub read_group: Option<String>,
    pub location: Option<PhysicalLocationInt>,
}

impl DuplicateCandidate {
    pub fn new(rec: &AlignmentRecord, ordinal: u64, score: CandidateScore) -> Self {
        let expected_mate = match (rec.reference_index, rec.mate_reference_index) {
            (Some(own), Some(mate))
                if rec.is_paired_and_both_mapped()
                    && (mate, rec.mate_alignment_start) >= (own, rec.alignment_start) =>
            {
                Some((mate, rec.mate_alignment_start))
            }
            _ => None,
        };

        Self {
            name: rec.name.clone(),
            ordinals: vec![ordinal],
            paired: rec.is_paired_and_both_mapped(),
            expected_mate,
            score,
            read_group: rec.read_group.clone(),
            location: None,
        }
    }

    pub fn first_ordinal(&self) -> u64 {
        self.ordinals.first().copied().unwrap_or(u64::MAX)
    }

    /// Whether both ends of a pair have been observed.
    pub fn is_complete(&self) -> bool {
        !self.paired || self.ordinals.len() >= 2
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetState {
    Open,
    ReadyToClose,
    Closed,
}

#[derive(Clone, Debug)]
pub struct DuplicateSet {
    pub key: DuplicateSetKey,
    pub anchor: i64,
    pub candidates: Vec<DuplicateCandidate>,
    state: SetState,
}

impl DuplicateSet {
    pub fn state(&self) -> SetState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/**
 * Owns the open duplicate sets of the current reference and remembers recently closed keys so
 * that a late member is reported instead of silently starting a second set.
 */
#[derive(Debug, Default)]
pub struct DuplicateKeyGrouper {
    sets: HashMap<DuplicateSetKey, DuplicateSet>,
    closed: HashSet<DuplicateSetKey>,
    // closed keys in closing order, which is increasing anchor order
    closed_order: VecDeque<(i64, DuplicateSetKey)>,
}

impl DuplicateKeyGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_for(
        &self,
        rec: &AlignmentRecord,
        library_id: i16,
        resolved_self: ResolvedPosition,
        resolved_mate: Option<ResolvedPosition>,
    ) -> Result<DuplicateSetKey, Error> {
        if !rec.paired {
            return Ok(DuplicateSetKey::fragment(library_id, resolved_self));
        }

        if !rec.mate_mapped {
            return Ok(DuplicateSetKey::mate_unmapped(library_id, resolved_self));
        }

        match resolved_mate {
            Some(mate) => Ok(DuplicateSetKey::pair(library_id, resolved_self, mate)),
            None => Err(Error::malformed(
                &rec.name,
                "pair key requested before the mate position was resolved",
            )),
        }
    }

    /// Adds `candidate` to the set of `key`, creating the set if absent. Returns the index of
    /// the candidate within the set and whether the set is new.
    pub fn admit(
        &mut self,
        key: DuplicateSetKey,
        candidate: DuplicateCandidate,
        anchor: i64,
    ) -> Result<(usize, bool), Error> {
        if self.closed.contains(&key) {
            Err(Error::LateAdmission {
                read_name: candidate.name.clone(),
                key: key.to_string(),
            })?
        }

        let mut created = false;
        let set = self.sets.entry(key.clone()).or_insert_with(|| {
            created = true;
            DuplicateSet {
                key,
                anchor,
                candidates: Vec::new(),
                state: SetState::Open,
            }
        });

        set.candidates.push(candidate);

        Ok((set.candidates.len() - 1, created))
    }

    pub fn get_mut(&mut self, key: &DuplicateSetKey) -> Option<&mut DuplicateSet> {
        self.sets.get_mut(key)
    }

    pub fn mark_ready(&mut self, key: &DuplicateSetKey) {
        if let Some(set) = self.sets.get_mut(key) {
            set.state = SetState::ReadyToClose;
        }
    }

    /// Removes the set of `key` for emission. The key never accepts members again until it is forgotten.
    pub fn close(&mut self, key: &DuplicateSetKey) -> Option<DuplicateSet> {
        let mut set = self.sets.remove(key)?;
        set.state = SetState::Closed;

        self.closed.insert(key.clone());
        self.closed_order.push_back((set.anchor, key.clone()));

        Some(set)
    }

    /// Drops closed keys anchored before `position`; no record can target them any more.
    pub fn forget_closed_before(&mut self, position: i64) {
        while let Some((anchor, _)) = self.closed_order.front() {
            if *anchor >= position {
                break;
            }
            if let Some((_, key)) = self.closed_order.pop_front() {
                self.closed.remove(&key);
            }
        }
    }

    pub fn open_sets(&self) -> usize {
        self.sets.len()
    }

    /// Forgets closed keys at a reference change. Open sets must have been closed before.
    pub fn reset(&mut self) {
        self.closed.clear();
        self.closed_order.clear();
    }
}
