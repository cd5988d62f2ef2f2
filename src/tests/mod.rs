use crate::{
    hts::{
        cigar::Cigar,
        duplicate_scoring_strategy::ScoringStrategy,
        record::{AlignmentRecord, AlignmentRecordBuilder},
    },
    markdup::{
        config::MarkDuplicatesConfig,
        duplicate_set::KeyShape,
        markduplicates::{DuplicateMarker, MarkDuplicatesIterator, MarkedRecord},
        utils::physical_location::PhysicalLocationInt,
    },
    utils::errors::Error,
};

/// Builds a coordinate sorted record stream together with the duplicate flag each record should
/// end up with. Names are handed out as READ0, READ1, ... in the order records are added.
struct RecordSetBuilder {
    records: Vec<(AlignmentRecord, bool)>,
    next_name: usize,
    quality: u8,
    library: Option<String>,
    mate_cigars: bool,
}

impl RecordSetBuilder {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            next_name: 0,
            quality: 30,
            library: None,
            mate_cigars: true,
        }
    }

    fn quality(&mut self, quality: u8) -> &mut Self {
        self.quality = quality;
        self
    }

    fn library(&mut self, library: &str) -> &mut Self {
        self.library = Some(library.to_string());
        self
    }

    fn without_mate_cigars(&mut self) -> &mut Self {
        self.mate_cigars = false;
        self
    }

    fn next_name(&mut self) -> String {
        let name = format!("READ{}", self.next_name);
        self.next_name += 1;
        name
    }

    fn finish_record(&self, builder: AlignmentRecordBuilder, cigar: &str) -> AlignmentRecord {
        let read_length = cigar.parse::<Cigar>().unwrap().query_length() as usize;
        let builder = builder.uniform_quality(read_length, self.quality);
        match &self.library {
            Some(library) => builder.library(library).build().unwrap(),
            None => builder.build().unwrap(),
        }
    }

    fn add_fragment(&mut self, start: i64, cigar: &str, reverse: bool, duplicate: bool) -> String {
        let name = self.next_name();
        let builder = AlignmentRecord::builder(&name).mapped(0, start, cigar).reverse(reverse);
        let rec = self.finish_record(builder, cigar);
        self.records.push((rec, duplicate));
        name
    }

    /// Forward first end and reverse second end on reference 0.
    fn add_pair(
        &mut self,
        start1: i64,
        cigar1: &str,
        start2: i64,
        cigar2: &str,
        duplicate: bool,
    ) -> String {
        let name = self.next_name();
        let (mate_cigar1, mate_cigar2) = if self.mate_cigars {
            (Some(cigar2), Some(cigar1))
        } else {
            (None, None)
        };

        let first = AlignmentRecord::builder(&name)
            .mapped(0, start1, cigar1)
            .mate(0, start2, true, mate_cigar1);
        let second = AlignmentRecord::builder(&name)
            .mapped(0, start2, cigar2)
            .reverse(true)
            .mate(0, start1, false, mate_cigar2);

        let first = self.finish_record(first, cigar1);
        let second = self.finish_record(second, cigar2);
        self.records.push((first, duplicate));
        self.records.push((second, duplicate));
        name
    }

    /// Mapped end whose mate is unmapped and placed next to it.
    fn add_pair_with_unmapped_mate(&mut self, start: i64, cigar: &str, duplicate: bool) -> String {
        let name = self.next_name();

        let mapped = AlignmentRecord::builder(&name).mapped(0, start, cigar).mate_unmapped();
        let mapped = self.finish_record(mapped, cigar);
        let unmapped = AlignmentRecord::builder(&name)
            .unmapped(Some((0, start)))
            .mate(0, start, false, Some(cigar))
            .uniform_quality(mapped.base_qualities.len(), self.quality)
            .build()
            .unwrap();

        self.records.push((mapped, duplicate));
        self.records.push((unmapped, false));
        name
    }

    fn locate(&mut self, name: &str, read_group: &str, tile: i16, x: i32, y: i32) -> &mut Self {
        for (rec, _) in self.records.iter_mut().filter(|(r, _)| r.name == name) {
            rec.read_group = Some(read_group.to_string());
            rec.physical_location = Some(PhysicalLocationInt { tile, x, y });
        }
        self
    }

    fn sorted(&self) -> Vec<(AlignmentRecord, bool)> {
        let mut records = self.records.clone();
        records.sort_by_key(|(rec, _)| (rec.reference_index.unwrap_or(usize::MAX), rec.alignment_start));
        records
    }

    fn run(&self, config: MarkDuplicatesConfig) -> Result<Vec<MarkedRecord>, Error> {
        let records = self.sorted().into_iter().map(|(rec, _)| rec).collect::<Vec<_>>();
        MarkDuplicatesIterator::new(records, config)?.collect()
    }

    fn check(&self, config: MarkDuplicatesConfig) -> Vec<MarkedRecord> {
        let marked = self.run(config).unwrap();
        let expected = self.sorted();
        assert_eq!(marked.len(), expected.len());

        for (m, (rec, duplicate)) in marked.iter().zip(expected.iter()) {
            assert_eq!(&m.record, rec);
            assert_eq!(
                m.duplicate, *duplicate,
                "{} at {} should have duplicate={}",
                rec.name, rec.alignment_start, duplicate
            );
        }

        marked
    }
}

fn by_name<'a>(marked: &'a [MarkedRecord], name: &str) -> Vec<&'a MarkedRecord> {
    marked.iter().filter(|m| m.record.name == name).collect()
}

#[test]
fn minimum_distance_must_cover_the_largest_clip() {
    let records = || {
        vec![
            AlignmentRecord::builder("a").mapped(0, 1000, "100M").build().unwrap(),
            AlignmentRecord::builder("b").mapped(0, 2000, "10S100M").build().unwrap(),
            AlignmentRecord::builder("c")
                .mapped(0, 3000, "2000S100M")
                .reverse(true)
                .build()
                .unwrap(),
        ]
    };

    let marked = MarkDuplicatesIterator::new(records(), MarkDuplicatesConfig::new(990))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(marked.len(), 3);
    assert!(marked.iter().all(|m| !m.duplicate));

    for distance in [989, 0] {
        let err = MarkDuplicatesIterator::new(records(), MarkDuplicatesConfig::new(distance))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert!(
            matches!(err, Error::WindowInvariantViolation { required: 990, .. }),
            "{:?}",
            err
        );
    }
}

#[test]
fn higher_scoring_pair_is_representative() {
    let mut builder = RecordSetBuilder::new();
    builder.add_pair(1, "100M", 201, "100M", false);
    builder.add_pair(1, "90M", 211, "90M", true);

    let marked = builder.check(MarkDuplicatesConfig::new(100));

    let provenance = marked[0].provenance.as_ref().unwrap();
    assert_eq!(provenance.representative, "READ0");
    assert_eq!(provenance.set_size, 2);
    assert_eq!(provenance.key.shape, KeyShape::PairedBothMapped);
    assert_eq!(provenance.key.second.map(|p| p.coordinate), Some(300));
}

#[test]
fn equal_fragments_keep_the_greater_name() {
    let mut builder = RecordSetBuilder::new();
    builder.add_fragment(1, "100M", false, true);
    builder.add_fragment(1, "100M", false, false);
    builder.check(MarkDuplicatesConfig::new(10));

    // input order does not matter
    let records = vec![
        AlignmentRecord::builder("READ1").mapped(0, 1, "100M").build().unwrap(),
        AlignmentRecord::builder("READ0").mapped(0, 1, "100M").build().unwrap(),
    ];
    let marked = MarkDuplicatesIterator::new(records, MarkDuplicatesConfig::new(10))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(
        marked.iter().map(|m| (m.record.name.as_str(), m.duplicate)).collect::<Vec<_>>(),
        vec![("READ1", false), ("READ0", true)]
    );
}

#[test]
fn soft_clips_move_fragments_into_one_set() {
    let mut builder = RecordSetBuilder::new();
    // forward: unclipped start 96 for both
    builder.add_fragment(96, "100M", false, false);
    builder.add_fragment(101, "5S95M", false, true);
    // reverse: unclipped end 300 for both
    builder.add_fragment(201, "95M5S", true, false);
    builder.add_fragment(211, "90M", true, true);

    let marked = builder.check(MarkDuplicatesConfig::new(5));
    assert_eq!(marked[1].provenance.as_ref().unwrap().key.first.coordinate, 96);
    assert_eq!(marked[3].provenance.as_ref().unwrap().key.first.coordinate, 300);
}

#[test]
fn soft_clipped_mates_are_placed_from_the_mate_cigar() {
    let mut builder = RecordSetBuilder::new();
    builder.add_pair(1, "100M", 201, "100M", false);
    // second end ends at 290, its trailing clip puts the 5' end at 300
    builder.add_pair(1, "100M", 201, "90M10S", true);

    let marked = builder.check(MarkDuplicatesConfig::new(10));
    let duplicate = by_name(&marked, "READ1");
    assert_eq!(duplicate.len(), 2);
    assert!(duplicate.iter().all(|m| m.provenance.as_ref().unwrap().representative == "READ0"));
}

#[test]
fn hard_clips_do_not_move_positions() {
    let mut builder = RecordSetBuilder::new();
    builder.add_fragment(1, "10H100M", false, true);
    builder.add_fragment(1, "100M", false, false);

    let marked = builder.check(MarkDuplicatesConfig::new(10));
    assert_eq!(marked[0].provenance.as_ref().unwrap().set_size, 2);
}

#[test]
fn fragments_pairs_and_lonely_ends_never_mix() {
    let mut builder = RecordSetBuilder::new();
    builder.add_fragment(1, "100M", false, false);
    builder.add_pair(1, "100M", 201, "100M", false);
    builder.add_pair_with_unmapped_mate(1, "100M", true);
    builder.add_pair_with_unmapped_mate(1, "100M", false);

    let marked = builder.check(MarkDuplicatesConfig::new(10));

    let lonely = by_name(&marked, "READ2");
    assert_eq!(lonely.len(), 2);
    let mapped = lonely.iter().find(|m| m.record.mapped).unwrap();
    assert_eq!(mapped.provenance.as_ref().unwrap().key.shape, KeyShape::PairedMateUnmapped);
    let unmapped = lonely.iter().find(|m| !m.record.mapped).unwrap();
    assert!(!unmapped.duplicate);
    assert!(unmapped.provenance.is_none());
}

#[test]
fn libraries_are_kept_apart() {
    let mut builder = RecordSetBuilder::new();
    builder.library("libA").add_fragment(1, "100M", false, false);
    builder.library("libB").add_fragment(1, "100M", false, true);
    builder.library("libB").add_fragment(1, "100M", false, false);

    let mut marker = DuplicateMarker::new(MarkDuplicatesConfig::new(10)).unwrap();
    for (rec, _) in builder.sorted() {
        marker.add(rec).unwrap();
    }
    let marked = marker.finish().unwrap();
    assert_eq!(
        marked.iter().map(|m| m.duplicate).collect::<Vec<_>>(),
        vec![false, true, false]
    );

    let summary = marker.summary();
    assert_eq!(summary.unpaired_reads_examined, 3);
    assert_eq!(summary.unpaired_read_duplicates, 1);
    assert_eq!(summary.duplicate_sets, 1);
    assert_eq!(summary.libraries["libA"].duplicate_sets.get(&1), Some(&1));
    assert_eq!(summary.libraries["libB"].duplicate_sets.get(&2), Some(&1));
}

#[test]
fn pairs_without_mate_cigars_wait_for_the_mate() {
    let mut builder = RecordSetBuilder::new();
    builder.without_mate_cigars();
    builder.quality(30).add_pair(1, "100M", 201, "100M", false);
    builder.quality(20).add_pair(1, "100M", 201, "100M", true);

    let mut config = MarkDuplicatesConfig::new(100);
    config.has_mate_cigar_information = false;
    config.scoring_strategy = ScoringStrategy::SumOfBaseQualities;

    let marked = builder.check(config);
    let key = &marked[0].provenance.as_ref().unwrap().key;
    assert_eq!(key.second.map(|p| p.coordinate), Some(300));
}

#[test]
fn pairs_whose_mate_never_arrives_are_placed_at_the_mate_start() {
    let orphan = |name: &str| {
        AlignmentRecord::builder(name)
            .mapped(0, 1, "100M")
            .mate(0, 201, true, None)
            .uniform_quality(100, 30)
            .build()
            .unwrap()
    };
    let records = vec![
        orphan("ORPHAN_A"),
        orphan("ORPHAN_B"),
        AlignmentRecord::builder("FAR")
            .mapped(0, 1000, "100M")
            .uniform_quality(100, 30)
            .build()
            .unwrap(),
    ];

    let mut config = MarkDuplicatesConfig::new(100);
    config.has_mate_cigar_information = false;
    config.scoring_strategy = ScoringStrategy::SumOfBaseQualities;

    let mut marker = DuplicateMarker::new(config).unwrap();
    marker.add(records[0].clone()).unwrap();
    marker.add(records[1].clone()).unwrap();
    assert!(marker.poll().is_empty());

    // the window moves past the mate start, so both pairs are decided before the stream ends
    marker.add(records[2].clone()).unwrap();
    let released = marker.poll();
    assert_eq!(
        released.iter().map(|m| (m.record.name.as_str(), m.duplicate)).collect::<Vec<_>>(),
        vec![("ORPHAN_A", true), ("ORPHAN_B", false)]
    );
    let key = &released[0].provenance.as_ref().unwrap().key;
    assert_eq!(key.second.map(|p| p.coordinate), Some(201));

    let rest = marker.finish().unwrap();
    assert_eq!(rest.len(), 1);
    assert!(!rest[0].duplicate);
}

#[test]
fn pairs_across_references_carry_their_decision() {
    let end = |name: &str, reference: usize, mate_reference: usize, reverse: bool| {
        AlignmentRecord::builder(name)
            .mapped(reference, 1, "100M")
            .reverse(reverse)
            .mate(mate_reference, 1, !reverse, Some("100M"))
            .uniform_quality(100, 30)
            .build()
            .unwrap()
    };
    let records = vec![
        end("XA", 0, 1, false),
        end("XB", 0, 1, false),
        end("XA", 1, 0, true),
        end("XB", 1, 0, true),
    ];

    let mut iter = MarkDuplicatesIterator::new(records, MarkDuplicatesConfig::new(10)).unwrap();
    let marked = iter.by_ref().collect::<Result<Vec<_>, _>>().unwrap();

    assert_eq!(
        marked
            .iter()
            .map(|m| (m.record.name.as_str(), m.record.reference_index, m.duplicate))
            .collect::<Vec<_>>(),
        vec![
            ("XA", Some(0), true),
            ("XB", Some(0), false),
            ("XA", Some(1), true),
            ("XB", Some(1), false),
        ]
    );

    let summary = iter.summary();
    assert_eq!(summary.read_pairs_examined, 2);
    assert_eq!(summary.read_pair_duplicates, 1);
}

#[test]
fn optical_duplicates_are_annotated_around_the_representative() {
    let mut builder = RecordSetBuilder::new();
    let far = builder.add_pair(1, "100M", 201, "100M", true);
    let near = builder.add_pair(1, "100M", 201, "100M", true);
    let representative = builder.add_pair(1, "100M", 201, "100M", false);
    builder
        .locate(&far, "rg1", 1, 5000, 5000)
        .locate(&near, "rg1", 1, 150, 150)
        .locate(&representative, "rg1", 1, 100, 100);

    let mut marker = DuplicateMarker::new(MarkDuplicatesConfig::new(10)).unwrap();
    for (rec, _) in builder.sorted() {
        marker.add(rec).unwrap();
    }
    let marked = marker.finish().unwrap();

    let optical = |name: &str| {
        by_name(&marked, name)
            .iter()
            .map(|m| m.optical_duplicate)
            .collect::<Vec<_>>()
    };
    assert_eq!(optical(&representative), vec![Some(false); 2]);
    assert_eq!(optical(&near), vec![Some(true); 2]);
    assert_eq!(optical(&far), vec![Some(false); 2]);

    let summary = marker.summary();
    assert_eq!(summary.read_pair_duplicates, 2);
    assert_eq!(summary.read_pair_optical_duplicates, 1);
}

#[test]
fn random_scores_are_stable() {
    let run = || {
        let mut builder = RecordSetBuilder::new();
        builder.add_fragment(1, "100M", false, false);
        builder.add_fragment(1, "100M", false, false);
        let mut config = MarkDuplicatesConfig::new(10);
        config.scoring_strategy = ScoringStrategy::Random;
        builder
            .run(config)
            .unwrap()
            .into_iter()
            .map(|m| m.duplicate)
            .collect::<Vec<_>>()
    };

    let first = run();
    assert_eq!(first.iter().filter(|&&d| d).count(), 1);
    assert_eq!(first, run());
}

#[test]
fn secondary_and_unmapped_records_pass_through() {
    let records = vec![
        AlignmentRecord::builder("p").mapped(0, 1, "100M").build().unwrap(),
        AlignmentRecord::builder("s").mapped(0, 1, "100M").secondary(true).build().unwrap(),
        AlignmentRecord::builder("x").mapped(0, 1, "100M").supplementary(true).build().unwrap(),
        AlignmentRecord::builder("u").unmapped(None).build().unwrap(),
    ];

    let mut iter = MarkDuplicatesIterator::new(records, MarkDuplicatesConfig::new(10)).unwrap();
    let marked = iter.by_ref().collect::<Result<Vec<_>, _>>().unwrap();
    assert!(marked.iter().all(|m| !m.duplicate));
    assert!(marked[1..].iter().all(|m| m.provenance.is_none()));

    let summary = iter.summary();
    assert_eq!(summary.records, 4);
    assert_eq!(summary.secondary_or_supplementary_records, 2);
    assert_eq!(summary.unmapped_records, 1);
    assert_eq!(summary.unpaired_reads_examined, 1);
}

#[test]
fn reference_length_keeps_the_longer_pair() {
    let pair = |name: &str, start2: i64, cigar2: &str| {
        vec![
            AlignmentRecord::builder(name)
                .mapped(0, 1, "50M")
                .mate(0, start2, true, Some(cigar2))
                .uniform_quality(50, 30)
                .build()
                .unwrap(),
            AlignmentRecord::builder(name)
                .mapped(0, start2, cigar2)
                .reverse(true)
                .mate(0, 1, false, Some("50M"))
                .uniform_quality(50, 30)
                .build()
                .unwrap(),
        ]
    };

    // both second ends have their 5' end at 200
    let x = pair("READX", 151, "50M");
    let y = pair("READY", 156, "5I45M");
    let records = vec![x[0].clone(), y[0].clone(), x[1].clone(), y[1].clone()];

    let duplicates = |strategy: ScoringStrategy| {
        let mut config = MarkDuplicatesConfig::new(10);
        config.scoring_strategy = strategy;
        MarkDuplicatesIterator::new(records.clone(), config)
            .unwrap()
            .map(|m| m.unwrap())
            .filter(|m| m.duplicate)
            .map(|m| m.record.name)
            .collect::<Vec<_>>()
    };

    assert_eq!(duplicates(ScoringStrategy::TotalMappedReferenceLength), vec!["READY", "READY"]);
    // equal qualities leave only the name to decide
    assert_eq!(duplicates(ScoringStrategy::SumOfBaseQualities), vec!["READX", "READX"]);
}
