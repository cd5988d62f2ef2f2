use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
};

use macro_sup::set_mlog;
use serde::Serialize;

use crate::{
    hts::{duplicate_scoring_strategy::DuplicateScoringStrategy, record::AlignmentRecord},
    utils::{errors::Error, logging::ProgressLogger},
};

use super::{
    config::MarkDuplicatesConfig,
    coordinate_resolver::{CoordinateResolver, ResolvedPosition},
    duplicate_set::{DuplicateCandidate, DuplicateKeyGrouper, DuplicateSet, DuplicateSetKey},
    streaming_window::{Advance, StreamingWindow},
    utils::{
        library_id_generator::{LibraryHistograms, LibraryIdGenerator},
        optical_duplicate_finder::{OpticalDuplicateFinder, OpticalMember},
    },
};

set_mlog!(stringify!(DuplicateMarker));

/// Which duplicate set decided a record, and who represents it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Provenance {
    pub key: DuplicateSetKey,
    pub representative: String,
    pub set_size: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkedRecord {
    pub record: AlignmentRecord,
    pub duplicate: bool,
    /// Set when optical clustering ran on the record's duplicate set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optical_duplicate: Option<bool>,
    /// Unset for records that were never duplicate candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

/// Counts over one pass, with per-library duplicate-set-size histograms.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DuplicationSummary {
    pub records: u64,
    pub unmapped_records: u64,
    pub secondary_or_supplementary_records: u64,
    pub unpaired_reads_examined: u64,
    pub read_pairs_examined: u64,
    pub unpaired_read_duplicates: u64,
    pub read_pair_duplicates: u64,
    pub read_pair_optical_duplicates: u64,
    pub duplicate_sets: u64,
    pub libraries: BTreeMap<String, LibraryHistograms>,
}

#[derive(Clone, Debug)]
struct Decision {
    duplicate: bool,
    optical_duplicate: Option<bool>,
    provenance: Option<Provenance>,
}

impl Decision {
    fn unmarked() -> Self {
        Self {
            duplicate: false,
            optical_duplicate: None,
            provenance: None,
        }
    }
}

struct Slot {
    record: AlignmentRecord,
    decision: Option<Decision>,
}

impl Slot {
    fn into_marked(self) -> MarkedRecord {
        let decision = self.decision.unwrap_or_else(Decision::unmarked);

        MarkedRecord {
            record: self.record,
            duplicate: decision.duplicate,
            optical_duplicate: decision.optical_duplicate,
            provenance: decision.provenance,
        }
    }
}

/// First end of a pair whose mate position could not be resolved from a mate cigar.
struct ProvisionalEnd {
    reference_index: usize,
    own: ResolvedPosition,
    library_id: i16,
    forced_key: DuplicateSetKey,
    seq: u64,
    candidate: DuplicateCandidate,
}

/**
 * Streaming duplicate marker over a coordinate sorted record stream.
 *
 * Records are handed in with [`DuplicateMarker::add`] and come back, in input order, from
 * [`DuplicateMarker::poll`] as soon as the duplicate sets of every earlier record have been decided.
 * After the last record [`DuplicateMarker::finish`] closes everything still open.
 */
pub struct DuplicateMarker {
    config: MarkDuplicatesConfig,
    resolver: CoordinateResolver,
    scoring: DuplicateScoringStrategy,
    grouper: DuplicateKeyGrouper,
    window: StreamingWindow,
    optical_duplicate_finder: OpticalDuplicateFinder,
    library_id_generator: LibraryIdGenerator,

    slots: VecDeque<Slot>,
    first_ordinal: u64,
    next_ordinal: u64,

    // pairs admitted with only their first end seen: name -> (key, index within the set)
    open_pairs: HashMap<String, (DuplicateSetKey, usize)>,
    // decisions of closed pairs whose second end has not arrived yet, also indexed by where
    // that end sorts so unreachable ones can be dropped
    pair_decisions: HashMap<String, ((usize, i64), Decision)>,
    pair_decision_order: BTreeSet<(usize, i64, String)>,
    provisional: HashMap<String, ProvisionalEnd>,
    provisional_order: BTreeMap<(i64, u64), String>,
    provisional_seq: u64,

    progress: Option<ProgressLogger>,
    summary: DuplicationSummary,
    poisoned: Option<Error>,
}

impl DuplicateMarker {
    pub fn new(config: MarkDuplicatesConfig) -> Result<Self, Error> {
        config.validate()?;

        let progress = (config.progress_interval > 0).then(|| {
            ProgressLogger::new("DuplicateMarker", config.progress_interval, "Read", "records")
        });

        mlog::info!(
            "Marking duplicates with MINIMUM_DISTANCE={} DUPLICATE_SCORING_STRATEGY={} ASSUME_MATE_CIGAR={}",
            config.minimum_distance,
            config.scoring_strategy,
            config.has_mate_cigar_information
        );

        Ok(Self {
            resolver: CoordinateResolver::new(config.has_mate_cigar_information),
            scoring: DuplicateScoringStrategy::new(
                config.scoring_strategy,
                config.has_mate_cigar_information,
            )?,
            grouper: DuplicateKeyGrouper::new(),
            window: StreamingWindow::new(config.minimum_distance),
            optical_duplicate_finder: config.optical_duplicate_finder()?,
            library_id_generator: LibraryIdGenerator::new(),
            slots: VecDeque::new(),
            first_ordinal: 0,
            next_ordinal: 0,
            open_pairs: HashMap::new(),
            pair_decisions: HashMap::new(),
            pair_decision_order: BTreeSet::new(),
            provisional: HashMap::new(),
            provisional_order: BTreeMap::new(),
            provisional_seq: 0,
            progress,
            summary: DuplicationSummary::default(),
            poisoned: None,
            config,
        })
    }

    pub fn config(&self) -> &MarkDuplicatesConfig {
        &self.config
    }

    /// Feeds the next record of the coordinate sorted stream. Any error is fatal: the marker keeps
    /// returning it from then on.
    pub fn add(&mut self, rec: AlignmentRecord) -> Result<(), Error> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }

        self.add_record(rec).map_err(|err| self.poison(err))
    }

    /// Records whose decision, and every earlier record's decision, is known. Input order is kept.
    pub fn poll(&mut self) -> Vec<MarkedRecord> {
        let mut released = Vec::new();

        while matches!(self.slots.front(), Some(slot) if slot.decision.is_some()) {
            if let Some(slot) = self.slots.pop_front() {
                self.first_ordinal += 1;
                released.push(slot.into_marked());
            }
        }

        released
    }

    /// Closes every open duplicate set and returns all records not yet released.
    pub fn finish(&mut self) -> Result<Vec<MarkedRecord>, Error> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }

        self.close_reference().map_err(|err| self.poison(err))?;

        if !self.pair_decisions.is_empty() {
            mlog::debug!(
                "{} pairs were decided without their second end ever being seen.",
                self.pair_decisions.len()
            );
            self.pair_decisions.clear();
            self.pair_decision_order.clear();
        }

        let summary = self.summary();
        mlog::info!(
            "Processed {} records: {} of {} unpaired reads and {} of {} read pairs are duplicates ({} optical).",
            summary.records,
            summary.unpaired_read_duplicates,
            summary.unpaired_reads_examined,
            summary.read_pair_duplicates,
            summary.read_pairs_examined,
            summary.read_pair_optical_duplicates
        );
        mlog::debug!(
            "{} optical duplicates in total. Duplicate set sizes:\n{}",
            self.library_id_generator.get_number_of_optical_duplicates(),
            self.library_id_generator.format_histograms()
        );

        let mut released = self.poll();
        // every set is closed by now, so nothing can still be waiting
        while let Some(slot) = self.slots.pop_front() {
            self.first_ordinal += 1;
            released.push(slot.into_marked());
        }

        Ok(released)
    }

    pub fn summary(&self) -> DuplicationSummary {
        DuplicationSummary {
            libraries: self.library_id_generator.histograms(),
            ..self.summary.clone()
        }
    }

    fn poison(&mut self, err: Error) -> Error {
        mlog::error!("{}", err);
        self.poisoned = Some(err.clone());
        err
    }

    fn add_record(&mut self, rec: AlignmentRecord) -> Result<(), Error> {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.summary.records += 1;

        if let Some(progress) = self.progress.as_mut() {
            progress.record(&rec);
        }

        if rec.mapped && rec.reference_index.is_none() {
            Err(Error::malformed(&rec.name, "mapped record has no reference"))?
        }

        match self.window.check_sorted(&rec)? {
            Advance::SameReference => {}
            Advance::NewReference(reference_index) => {
                self.close_reference()?;
                self.window.start_reference(reference_index, rec.alignment_start);
            }
            Advance::Unplaced => {
                self.close_reference()?;
            }
        }

        self.drop_unreachable_pair_decisions(&rec);

        if !rec.mapped || !rec.is_primary() {
            if !rec.mapped {
                self.summary.unmapped_records += 1;
            } else {
                self.summary.secondary_or_supplementary_records += 1;
            }

            self.slots.push_back(Slot {
                record: rec,
                decision: Some(Decision::unmarked()),
            });
            return Ok(());
        }

        let own = self.resolver.resolve(&rec)?;
        self.window
            .observe(&rec.name, self.resolver.unclipped_start(&rec))?;

        let decision = self.handle_candidate(&rec, ordinal, own)?;
        self.slots.push_back(Slot {
            record: rec,
            decision,
        });

        self.force_provisionals(false)?;
        self.close_ready()
    }

    /// Sorted input means no record can still arrive before `rec`, so decisions waiting for a mate
    /// that sorts earlier are dropped.
    fn drop_unreachable_pair_decisions(&mut self, rec: &AlignmentRecord) {
        let reachable = match rec.reference_index {
            Some(r) => self
                .pair_decision_order
                .split_off(&(r, rec.alignment_start, String::new())),
            None => BTreeSet::new(),
        };

        let unreachable = std::mem::replace(&mut self.pair_decision_order, reachable);
        if !unreachable.is_empty() {
            mlog::debug!(
                "{} pairs were decided without their second end, which can no longer arrive.",
                unreachable.len()
            );
        }
        for (_, _, name) in unreachable {
            self.pair_decisions.remove(&name);
        }
    }

    /// Routes a primary mapped record into its duplicate set. Returns a decision right away only
    /// for the second end of a pair whose set has already closed.
    fn handle_candidate(
        &mut self,
        rec: &AlignmentRecord,
        ordinal: u64,
        own: ResolvedPosition,
    ) -> Result<Option<Decision>, Error> {
        if rec.is_paired_and_both_mapped() {
            if let Some(((reference_index, alignment_start), decision)) =
                self.pair_decisions.remove(&rec.name)
            {
                self.pair_decision_order
                    .remove(&(reference_index, alignment_start, rec.name.clone()));
                return Ok(Some(decision));
            }

            if let Some((key, index)) = self.open_pairs.remove(&rec.name) {
                if let Some(candidate) = self
                    .grouper
                    .get_mut(&key)
                    .and_then(|set| set.candidates.get_mut(index))
                {
                    candidate.ordinals.push(ordinal);
                    self.scoring.observe_mate(&mut candidate.score, rec);
                }
                return Ok(None);
            }

            if let Some(pending) = self.provisional.remove(&rec.name) {
                let key = DuplicateSetKey::pair(pending.library_id, pending.own, own);
                let mut candidate = pending.candidate;
                candidate.ordinals.push(ordinal);
                self.scoring.observe_mate(&mut candidate.score, rec);

                self.admit(key, candidate, pending.reference_index)?;
                return Ok(None);
            }
        }

        let library_id = self.library_id_generator.get_library_id(&rec.library)?;
        let mut candidate =
            DuplicateCandidate::new(rec, ordinal, self.scoring.candidate_score(rec));
        candidate.location = self
            .optical_duplicate_finder
            .location_of(&rec.name, rec.physical_location);

        if !rec.is_paired_and_both_mapped() {
            let key = self.grouper.key_for(rec, library_id, own, None)?;
            self.admit(key, candidate, own.reference_index)?;
            return Ok(None);
        }

        match self.resolver.resolve_mate(rec)? {
            Some(mate) => {
                let key = self.grouper.key_for(rec, library_id, own, Some(mate))?;
                let index = self.admit(key.clone(), candidate, own.reference_index)?;
                self.open_pairs.insert(rec.name.clone(), (key, index));
            }
            None => {
                let mate = self.resolver.resolve_mate_from_start(rec)?;
                let forced_key = DuplicateSetKey::pair(library_id, own, mate);
                let trigger = forced_key
                    .anchor_on(own.reference_index)
                    .unwrap_or(own.coordinate);

                let seq = self.provisional_seq;
                self.provisional_seq += 1;

                self.provisional_order.insert((trigger, seq), rec.name.clone());
                self.provisional.insert(
                    rec.name.clone(),
                    ProvisionalEnd {
                        reference_index: own.reference_index,
                        own,
                        library_id,
                        forced_key,
                        seq,
                        candidate,
                    },
                );
            }
        }

        Ok(None)
    }

    fn admit(
        &mut self,
        key: DuplicateSetKey,
        candidate: DuplicateCandidate,
        reference_index: usize,
    ) -> Result<usize, Error> {
        let anchor = key.anchor_on(reference_index).unwrap_or(key.first.coordinate);
        let (index, created) = self.grouper.admit(key.clone(), candidate, anchor)?;

        if created {
            self.window.track(key, anchor);
        }

        Ok(index)
    }

    /// Places provisional pairs whose mate can no longer show up on this reference, using the
    /// mate's raw alignment start. With `all` every pending pair is placed.
    fn force_provisionals(&mut self, all: bool) -> Result<(), Error> {
        loop {
            let due = match self.provisional_order.first_key_value() {
                Some((&(trigger, seq), _)) if all || self.window.is_passed(trigger) => (trigger, seq),
                _ => break,
            };

            let name = match self.provisional_order.remove(&due) {
                Some(name) => name,
                None => break,
            };

            // the mate may have arrived in the meantime
            if !matches!(self.provisional.get(&name), Some(p) if p.seq == due.1) {
                continue;
            }

            if let Some(pending) = self.provisional.remove(&name) {
                mlog::debug!(
                    "Mate of {} was not seen in time; placing it at its alignment start.",
                    name
                );

                let index = self.admit(
                    pending.forced_key.clone(),
                    pending.candidate,
                    pending.reference_index,
                )?;
                self.open_pairs.insert(name, (pending.forced_key, index));
            }
        }

        Ok(())
    }

    fn close_ready(&mut self) -> Result<(), Error> {
        while let Some((_, key)) = self.window.pop_ready() {
            self.grouper.mark_ready(&key);
            self.close_set(&key)?;
        }

        if let Some(floor) = self.window.floor() {
            self.grouper
                .forget_closed_before(floor.saturating_sub(self.config.minimum_distance));
        }

        Ok(())
    }

    /// Closes everything of the current reference, in anchor order.
    fn close_reference(&mut self) -> Result<(), Error> {
        self.force_provisionals(true)?;

        if let Some(reference_index) = self.window.reference_index() {
            mlog::debug!(
                "Closing reference {} with {} open duplicate sets ({} tracked keys).",
                reference_index,
                self.grouper.open_sets(),
                self.window.open_keys()
            );
        }

        for (_, key) in self.window.drain_all() {
            self.grouper.mark_ready(&key);
            self.close_set(&key)?;
        }

        self.grouper.reset();

        Ok(())
    }

    fn close_set(&mut self, key: &DuplicateSetKey) -> Result<(), Error> {
        let set = match self.grouper.close(key) {
            Some(set) => set,
            None => return Ok(()),
        };

        let decisions = self.decide(&set);
        let optical = decisions
            .iter()
            .filter(|d| d.optical_duplicate == Some(true))
            .count();

        self.library_id_generator
            .track_duplicate_set(set.key.library_id, set.len() as u32, optical as u32);
        if set.len() > 1 {
            self.summary.duplicate_sets += 1;
        }

        for (candidate, decision) in set.candidates.into_iter().zip(decisions) {
            if candidate.paired {
                self.summary.read_pairs_examined += 1;
                if decision.duplicate {
                    self.summary.read_pair_duplicates += 1;
                }
                if decision.optical_duplicate == Some(true) {
                    self.summary.read_pair_optical_duplicates += 1;
                }
            } else {
                self.summary.unpaired_reads_examined += 1;
                if decision.duplicate {
                    self.summary.unpaired_read_duplicates += 1;
                }
            }

            for &ordinal in &candidate.ordinals {
                self.apply(ordinal, decision.clone());
            }

            if candidate.paired {
                self.open_pairs.remove(&candidate.name);
                if let Some((reference_index, alignment_start)) =
                    candidate.expected_mate.filter(|_| !candidate.is_complete())
                {
                    self.pair_decision_order.insert((
                        reference_index,
                        alignment_start,
                        candidate.name.clone(),
                    ));
                    self.pair_decisions
                        .insert(candidate.name, ((reference_index, alignment_start), decision));
                }
            }
        }

        Ok(())
    }

    /// Greater is preferred: higher score, then the lexicographically greater name, then the
    /// earlier record.
    fn preference(lhs: &DuplicateCandidate, rhs: &DuplicateCandidate) -> Ordering {
        lhs.score
            .total()
            .cmp(&rhs.score.total())
            .then_with(|| lhs.name.cmp(&rhs.name))
            .then_with(|| rhs.first_ordinal().cmp(&lhs.first_ordinal()))
    }

    fn decide(&self, set: &DuplicateSet) -> Vec<Decision> {
        let candidates = &set.candidates;

        let mut ranked = (0..candidates.len()).collect::<Vec<usize>>();
        ranked.sort_by(|&a, &b| Self::preference(&candidates[b], &candidates[a]));

        let representative = ranked[0];
        let provenance = Provenance {
            key: set.key.clone(),
            representative: candidates[representative].name.clone(),
            set_size: candidates.len(),
        };

        let mut optical = vec![None; candidates.len()];
        if candidates.len() > 1 && candidates.iter().any(|c| c.location.is_some()) {
            let members = ranked
                .iter()
                .map(|&i| OpticalMember {
                    read_group: candidates[i].read_group.clone(),
                    location: candidates[i].location,
                })
                .collect::<Vec<_>>();

            if let Some(flags) = self.optical_duplicate_finder.find_optical_duplicates(&members) {
                for (rank, &i) in ranked.iter().enumerate() {
                    optical[i] = Some(flags[rank]);
                }
            }
        }

        (0..candidates.len())
            .map(|i| Decision {
                duplicate: i != representative,
                optical_duplicate: optical[i],
                provenance: Some(provenance.clone()),
            })
            .collect()
    }

    fn apply(&mut self, ordinal: u64, decision: Decision) {
        let slot = ordinal
            .checked_sub(self.first_ordinal)
            .and_then(|i| self.slots.get_mut(i as usize));

        if let Some(slot) = slot {
            slot.decision = Some(decision);
        }
    }
}

/// Marks duplicates over any record iterator, yielding records in input order.
pub struct MarkDuplicatesIterator<I> {
    records: I,
    marker: DuplicateMarker,
    ready: VecDeque<MarkedRecord>,
    done: bool,
}

impl<I> MarkDuplicatesIterator<I>
where
    I: Iterator<Item = AlignmentRecord>,
{
    pub fn new(
        records: impl IntoIterator<IntoIter = I>,
        config: MarkDuplicatesConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            records: records.into_iter(),
            marker: DuplicateMarker::new(config)?,
            ready: VecDeque::new(),
            done: false,
        })
    }

    pub fn summary(&self) -> DuplicationSummary {
        self.marker.summary()
    }
}

impl<I> Iterator for MarkDuplicatesIterator<I>
where
    I: Iterator<Item = AlignmentRecord>,
{
    type Item = Result<MarkedRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(marked) = self.ready.pop_front() {
                return Some(Ok(marked));
            }

            if self.done {
                return None;
            }

            match self.records.next() {
                Some(rec) => match self.marker.add(rec) {
                    Ok(()) => self.ready.extend(self.marker.poll()),
                    Err(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                },
                None => {
                    self.done = true;
                    match self.marker.finish() {
                        Ok(released) => self.ready.extend(released),
                        Err(err) => return Some(Err(err)),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fragment(name: &str, start: i64, cigar: &str) -> AlignmentRecord {
        AlignmentRecord::builder(name)
            .mapped(0, start, cigar)
            .uniform_quality(50, 30)
            .build()
            .unwrap()
    }

    #[test]
    fn records_are_released_in_input_order_once_decided() {
        let mut marker = DuplicateMarker::new(MarkDuplicatesConfig::new(10)).unwrap();

        marker.add(fragment("a", 100, "50M")).unwrap();
        marker.add(fragment("b", 100, "50M")).unwrap();
        assert!(marker.poll().is_empty());

        marker.add(fragment("c", 200, "50M")).unwrap();
        let released = marker.poll();
        assert_eq!(
            released.iter().map(|m| (m.record.name.as_str(), m.duplicate)).collect::<Vec<_>>(),
            vec![("a", true), ("b", false)]
        );

        let rest = marker.finish().unwrap();
        assert_eq!(rest.len(), 1);
        assert!(!rest[0].duplicate);
        assert_eq!(rest[0].provenance.as_ref().map(|p| p.set_size), Some(1));
    }

    #[test]
    fn decisions_for_mates_that_never_arrive_are_dropped() {
        let mut marker = DuplicateMarker::new(MarkDuplicatesConfig::new(10)).unwrap();

        for i in 0..5000 {
            let start = i * 1000 + 1;
            let rec = AlignmentRecord::builder(&format!("pair{}", i))
                .mapped(0, start, "100M")
                .mate(0, start + 200, true, Some("100M"))
                .uniform_quality(100, 30)
                .build()
                .unwrap();
            marker.add(rec).unwrap();
            marker.poll();

            assert!(marker.pair_decisions.len() <= 2, "{} decisions kept", marker.pair_decisions.len());
            assert_eq!(marker.pair_decision_order.len(), marker.pair_decisions.len());
        }

        // the second end of the last pair can still arrive
        let mate = AlignmentRecord::builder("pair4999")
            .mapped(0, 4_999_201, "100M")
            .reverse(true)
            .mate(0, 4_999_001, false, Some("100M"))
            .uniform_quality(100, 30)
            .build()
            .unwrap();
        marker.add(mate).unwrap();

        let out = marker.finish().unwrap();
        assert_eq!(out.last().map(|m| m.record.name.as_str()), Some("pair4999"));
        assert_eq!(
            out.last().and_then(|m| m.provenance.as_ref()).map(|p| p.representative.as_str()),
            Some("pair4999")
        );
        assert!(marker.pair_decisions.is_empty());
        assert_eq!(marker.summary().read_pairs_examined, 5000);
    }

    #[test]
    fn marker_stays_poisoned_after_an_error() {
        let mut marker = DuplicateMarker::new(MarkDuplicatesConfig::new(10)).unwrap();

        marker.add(fragment("a", 100, "50M")).unwrap();
        let err = marker.add(fragment("b", 50, "50M")).unwrap_err();
        assert!(matches!(err, Error::UnsortedInput { .. }));

        assert_eq!(marker.add(fragment("c", 200, "50M")).unwrap_err(), err);
        assert_eq!(marker.finish().unwrap_err(), err);
    }

    #[test]
    fn non_candidates_pass_through_unmarked() {
        let mut marker = DuplicateMarker::new(MarkDuplicatesConfig::new(10)).unwrap();

        let secondary = AlignmentRecord::builder("s").mapped(0, 100, "50M").secondary(true).build().unwrap();
        let placed_unmapped = AlignmentRecord::builder("u").unmapped(Some((0, 100))).build().unwrap();
        let unplaced = AlignmentRecord::builder("x").unmapped(None).build().unwrap();

        marker.add(fragment("a", 100, "50M")).unwrap();
        marker.add(secondary).unwrap();
        marker.add(placed_unmapped).unwrap();
        marker.add(fragment("b", 100, "50M")).unwrap();
        marker.add(unplaced).unwrap();

        let out = marker.finish().unwrap();
        assert_eq!(
            out.iter().map(|m| (m.record.name.as_str(), m.duplicate, m.provenance.is_some())).collect::<Vec<_>>(),
            vec![("a", true, true), ("s", false, false), ("u", false, false), ("b", false, true), ("x", false, false)]
        );

        let summary = marker.summary();
        assert_eq!(summary.records, 5);
        assert_eq!(summary.unmapped_records, 2);
        assert_eq!(summary.secondary_or_supplementary_records, 1);
        assert_eq!(summary.unpaired_reads_examined, 2);
        assert_eq!(summary.unpaired_read_duplicates, 1);
        assert_eq!(summary.duplicate_sets, 1);
        assert_eq!(
            summary.libraries["Unknown Library"].duplicate_sets,
            BTreeMap::from([(2, 1)])
        );
    }

    #[test]
    fn iterator_reports_the_first_error_and_stops() {
        let records = vec![
            fragment("a", 1000, "100M"),
            fragment("b", 2000, "10S100M"),
            AlignmentRecord::builder("c")
                .mapped(0, 3000, "2000S100M")
                .reverse(true)
                .build()
                .unwrap(),
            fragment("d", 4000, "100M"),
        ];

        let results = MarkDuplicatesIterator::new(records, MarkDuplicatesConfig::new(0))
            .unwrap()
            .collect::<Vec<_>>();

        assert!(results.iter().take(results.len() - 1).all(|r| r.is_ok()));
        assert!(matches!(
            results.last(),
            Some(Err(Error::WindowInvariantViolation { required: 990, .. }))
        ));
    }
}
