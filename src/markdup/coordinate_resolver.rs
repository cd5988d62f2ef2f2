use bio_types::strand::ReqStrand;
use serde::Serialize;

use crate::{
    hts::record::{req_strand_serde, AlignmentRecord},
    utils::errors::Error,
};

/// Unclipped 5' position of one read end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedPosition {
    pub reference_index: usize,
    pub coordinate: i64,
    #[serde(with = "req_strand_serde")]
    pub strand: ReqStrand,
}

impl ResolvedPosition {
    /// Total order used to put the two ends of a pair in canonical order.
    pub(crate) fn sort_key(&self) -> (usize, i64, bool) {
        (
            self.reference_index,
            self.coordinate,
            matches!(self.strand, ReqStrand::Reverse),
        )
    }
}

impl std::fmt::Display for ResolvedPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let strand = match self.strand {
            ReqStrand::Forward => '+',
            ReqStrand::Reverse => '-',
        };
        write!(f, "{}:{}{}", self.reference_index, self.coordinate, strand)
    }
}

/**
 * Computes unclipped 5' positions from a record's own cigar and, when mate cigar information is
 * trusted, from the cached cigar of its mate.
 */
#[derive(Clone, Copy, Debug)]
pub struct CoordinateResolver {
    has_mate_cigar_information: bool,
}

impl CoordinateResolver {
    pub fn new(has_mate_cigar_information: bool) -> Self {
        Self {
            has_mate_cigar_information,
        }
    }

    fn validate(&self, rec: &AlignmentRecord) -> Result<usize, Error> {
        let reference_index = rec
            .reference_index
            .ok_or_else(|| Error::malformed(&rec.name, "mapped record has no reference"))?;

        if rec.alignment_start < 1 {
            Err(Error::malformed(
                &rec.name,
                format!("mapped record has alignment start {}", rec.alignment_start),
            ))?
        }

        if rec.cigar.is_empty() {
            Err(Error::malformed(&rec.name, "mapped record has no cigar"))?
        }

        if rec.cigar.reference_length() == 0 {
            Err(Error::malformed(
                &rec.name,
                format!("cigar {} consumes no reference bases", rec.cigar),
            ))?
        }

        let clipped = rec.cigar.leading_soft_clip() + rec.cigar.trailing_soft_clip();
        if !rec.base_qualities.is_empty() && clipped > rec.base_qualities.len() as i64 {
            Err(Error::malformed(
                &rec.name,
                format!(
                    "cigar {} soft clips {} bases of a {} base read",
                    rec.cigar,
                    clipped,
                    rec.base_qualities.len()
                ),
            ))?
        }

        Ok(reference_index)
    }

    /// Unclipped 5' position of the record itself.
    pub fn resolve(&self, rec: &AlignmentRecord) -> Result<ResolvedPosition, Error> {
        if !rec.mapped {
            Err(Error::malformed(&rec.name, "unmapped record has no position"))?
        }

        let reference_index = self.validate(rec)?;

        let coordinate = if rec.is_reverse() {
            rec.alignment_end() + rec.cigar.trailing_soft_clip()
        } else {
            rec.alignment_start - rec.cigar.leading_soft_clip()
        };

        Ok(ResolvedPosition {
            reference_index,
            coordinate,
            strand: rec.strand,
        })
    }

    /// Soft-clip-adjusted leftmost coordinate, whatever the strand.
    pub fn unclipped_start(&self, rec: &AlignmentRecord) -> i64 {
        rec.alignment_start - rec.cigar.leading_soft_clip()
    }

    /**
     * Unclipped 5' position of the mate computed from the mate cigar. `None` when the record has
     * no mapped mate, or when the mate position cannot be known before the mate record is seen.
     */
    pub fn resolve_mate(&self, rec: &AlignmentRecord) -> Result<Option<ResolvedPosition>, Error> {
        if !rec.is_paired_and_both_mapped() {
            return Ok(None);
        }

        let reference_index = rec
            .mate_reference_index
            .ok_or_else(|| Error::malformed(&rec.name, "mapped mate has no reference"))?;

        let mate_cigar = match (&rec.mate_cigar, self.has_mate_cigar_information) {
            (Some(mate_cigar), true) => mate_cigar,
            _ => return Ok(None),
        };

        if mate_cigar.reference_length() == 0 {
            Err(Error::malformed(
                &rec.name,
                format!("mate cigar {} consumes no reference bases", mate_cigar),
            ))?
        }

        let coordinate = if rec.is_mate_reverse() {
            rec.mate_alignment_start + mate_cigar.reference_length() - 1
                + mate_cigar.trailing_soft_clip()
        } else {
            rec.mate_alignment_start - mate_cigar.leading_soft_clip()
        };

        Ok(Some(ResolvedPosition {
            reference_index,
            coordinate,
            strand: rec.mate_strand,
        }))
    }

    /// Best guess of the mate position from its raw alignment start, used when the mate record
    /// never showed up in time.
    pub fn resolve_mate_from_start(&self, rec: &AlignmentRecord) -> Result<ResolvedPosition, Error> {
        let reference_index = rec
            .mate_reference_index
            .ok_or_else(|| Error::malformed(&rec.name, "mapped mate has no reference"))?;

        Ok(ResolvedPosition {
            reference_index,
            coordinate: rec.mate_alignment_start,
            strand: rec.mate_strand,
        })
    }
}
