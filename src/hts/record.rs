use bio_types::strand::ReqStrand;
use serde::{Deserialize, Serialize};

use crate::{markdup::utils::physical_location::PhysicalLocationInt, utils::errors::Error};

use super::cigar::Cigar;

/// An already-parsed alignment record, as handed to the engine by the upstream reader.
///
/// `alignment_start` and `cigar` are only meaningful when `mapped` is true. Coordinates are 1-based.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub name: String,

    #[serde(default)]
    pub reference_index: Option<usize>,
    #[serde(default)]
    pub alignment_start: i64,
    #[serde(default)]
    pub cigar: Cigar,
    #[serde(with = "req_strand_serde", default = "forward")]
    pub strand: ReqStrand,

    #[serde(default = "yes")]
    pub mapped: bool,
    #[serde(default)]
    pub paired: bool,

    #[serde(default)]
    pub mate_reference_index: Option<usize>,
    #[serde(default)]
    pub mate_alignment_start: i64,
    #[serde(with = "req_strand_serde", default = "forward")]
    pub mate_strand: ReqStrand,
    #[serde(default)]
    pub mate_mapped: bool,
    /** Cached copy of the mate's cigar (the SAM `MC` tag), if the upstream reader could supply it. */
    #[serde(default)]
    pub mate_cigar: Option<Cigar>,

    #[serde(default = "unknown_library")]
    pub library: String,
    #[serde(default)]
    pub read_group: Option<String>,
    #[serde(default)]
    pub base_qualities: Vec<u8>,
    #[serde(default)]
    pub physical_location: Option<PhysicalLocationInt>,

    #[serde(default)]
    pub secondary: bool,
    #[serde(default)]
    pub supplementary: bool,
    #[serde(default)]
    pub qc_fail: bool,
}

pub const UNKNOWN_LIBRARY: &'static str = "Unknown Library";

fn yes() -> bool {
    true
}

fn forward() -> ReqStrand {
    ReqStrand::Forward
}

fn unknown_library() -> String {
    UNKNOWN_LIBRARY.to_string()
}

impl AlignmentRecord {
    pub fn builder(name: &str) -> AlignmentRecordBuilder {
        AlignmentRecordBuilder::new(name)
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self.strand, ReqStrand::Reverse)
    }

    pub fn is_mate_reverse(&self) -> bool {
        matches!(self.mate_strand, ReqStrand::Reverse)
    }

    /// Paired with both ends mapped.
    pub fn is_paired_and_both_mapped(&self) -> bool {
        self.paired && self.mapped && self.mate_mapped
    }

    /// Secondary and supplementary alignments are never duplicate candidates.
    pub fn is_primary(&self) -> bool {
        !(self.secondary || self.supplementary)
    }

    /// 1-based inclusive end of the aligned part of the read.
    pub fn alignment_end(&self) -> i64 {
        self.alignment_start + self.cigar.reference_length() - 1
    }
}

pub(crate) mod req_strand_serde {
    use bio_types::strand::ReqStrand;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(strand: &ReqStrand, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match strand {
            ReqStrand::Forward => "+",
            ReqStrand::Reverse => "-",
        })
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ReqStrand, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "+" | "F" | "forward" => Ok(ReqStrand::Forward),
            "-" | "R" | "reverse" => Ok(ReqStrand::Reverse),
            other => Err(serde::de::Error::custom(format!("invalid strand '{}'", other))),
        }
    }
}

/// Convenience builder, mostly for tests and for upstream readers that assemble records field by field.
#[derive(Clone, Debug)]
pub struct AlignmentRecordBuilder {
    name: String,
    reference_index: Option<usize>,
    alignment_start: i64,
    cigar: String,
    reverse: bool,
    mapped: bool,
    paired: bool,
    mate_reference_index: Option<usize>,
    mate_alignment_start: i64,
    mate_reverse: bool,
    mate_mapped: bool,
    mate_cigar: Option<String>,
    library: String,
    read_group: Option<String>,
    base_qualities: Vec<u8>,
    physical_location: Option<PhysicalLocationInt>,
    secondary: bool,
    supplementary: bool,
    qc_fail: bool,
}

impl AlignmentRecordBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reference_index: None,
            alignment_start: 0,
            cigar: String::new(),
            reverse: false,
            mapped: false,
            paired: false,
            mate_reference_index: None,
            mate_alignment_start: 0,
            mate_reverse: false,
            mate_mapped: false,
            mate_cigar: None,
            library: UNKNOWN_LIBRARY.to_string(),
            read_group: None,
            base_qualities: Vec::new(),
            physical_location: None,
            secondary: false,
            supplementary: false,
            qc_fail: false,
        }
    }

    pub fn mapped(mut self, reference_index: usize, alignment_start: i64, cigar: &str) -> Self {
        self.mapped = true;
        self.reference_index = Some(reference_index);
        self.alignment_start = alignment_start;
        self.cigar = cigar.to_string();
        self
    }

    /// Unmapped record. `placed_at` gives the reference and position it sorts at, usually its mate's.
    pub fn unmapped(mut self, placed_at: Option<(usize, i64)>) -> Self {
        self.mapped = false;
        self.cigar.clear();
        match placed_at {
            Some((reference_index, start)) => {
                self.reference_index = Some(reference_index);
                self.alignment_start = start;
            }
            None => {
                self.reference_index = None;
                self.alignment_start = 0;
            }
        }
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn mate(
        mut self,
        reference_index: usize,
        alignment_start: i64,
        reverse: bool,
        mate_cigar: Option<&str>,
    ) -> Self {
        self.paired = true;
        self.mate_mapped = true;
        self.mate_reference_index = Some(reference_index);
        self.mate_alignment_start = alignment_start;
        self.mate_reverse = reverse;
        self.mate_cigar = mate_cigar.map(|c| c.to_string());
        self
    }

    pub fn mate_unmapped(mut self) -> Self {
        self.paired = true;
        self.mate_mapped = false;
        self.mate_reference_index = self.reference_index;
        self.mate_alignment_start = self.alignment_start;
        self.mate_cigar = None;
        self
    }

    pub fn library(mut self, library: &str) -> Self {
        self.library = library.to_string();
        self
    }

    pub fn read_group(mut self, read_group: &str) -> Self {
        self.read_group = Some(read_group.to_string());
        self
    }

    pub fn qualities(mut self, base_qualities: Vec<u8>) -> Self {
        self.base_qualities = base_qualities;
        self
    }

    pub fn uniform_quality(mut self, length: usize, quality: u8) -> Self {
        self.base_qualities = vec![quality; length];
        self
    }

    pub fn location(mut self, tile: i16, x: i32, y: i32) -> Self {
        self.physical_location = Some(PhysicalLocationInt { tile, x, y });
        self
    }

    pub fn secondary(mut self, secondary: bool) -> Self {
        self.secondary = secondary;
        self
    }

    pub fn supplementary(mut self, supplementary: bool) -> Self {
        self.supplementary = supplementary;
        self
    }

    pub fn qc_fail(mut self, qc_fail: bool) -> Self {
        self.qc_fail = qc_fail;
        self
    }

    pub fn build(self) -> Result<AlignmentRecord, Error> {
        let strand = |reverse: bool| {
            if reverse {
                ReqStrand::Reverse
            } else {
                ReqStrand::Forward
            }
        };

        Ok(AlignmentRecord {
            cigar: self.cigar.parse::<Cigar>()?,
            mate_cigar: self.mate_cigar.as_deref().map(str::parse::<Cigar>).transpose()?,
            name: self.name,
            reference_index: self.reference_index,
            alignment_start: self.alignment_start,
            strand: strand(self.reverse),
            mapped: self.mapped,
            paired: self.paired,
            mate_reference_index: self.mate_reference_index,
            mate_alignment_start: self.mate_alignment_start,
            mate_strand: strand(self.mate_reverse),
            mate_mapped: self.mate_mapped,
            library: self.library,
            read_group: self.read_group,
            base_qualities: self.base_qualities,
            physical_location: self.physical_location,
            secondary: self.secondary,
            supplementary: self.supplementary,
            qc_fail: self.qc_fail,
        })
    }
}
