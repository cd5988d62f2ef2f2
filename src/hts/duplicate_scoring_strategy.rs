use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::utils::errors::Error;

use super::{record::AlignmentRecord, utils::murmur3::Murmur3};

/// How the representative of a duplicate set is chosen: the candidate with the greatest score wins.
#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoringStrategy {
    #[value(name = "SUM_OF_BASE_QUALITIES")]
    SumOfBaseQualities,
    #[value(name = "TOTAL_MAPPED_REFERENCE_LENGTH")]
    TotalMappedReferenceLength,
    #[value(name = "RANDOM")]
    Random,
}

impl Default for ScoringStrategy {
    fn default() -> Self {
        ScoringStrategy::TotalMappedReferenceLength
    }
}

impl Display for ScoringStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScoringStrategy::SumOfBaseQualities => "SUM_OF_BASE_QUALITIES",
            ScoringStrategy::TotalMappedReferenceLength => "TOTAL_MAPPED_REFERENCE_LENGTH",
            ScoringStrategy::Random => "RANDOM",
        };

        write!(f, "{}", name)
    }
}

/// Score parts of one duplicate candidate. For pairs the mate end is taken from the observed mate
/// record when it has arrived, and from the mate cigar otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CandidateScore {
    pub own: i32,
    pub mate_from_cigar: Option<i32>,
    pub mate_observed: Option<i32>,
}

impl CandidateScore {
    pub fn total(&self) -> i32 {
        self.own + self.mate_observed.or(self.mate_from_cigar).unwrap_or(0)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DuplicateScoringStrategy {
    strategy: ScoringStrategy,
    has_mate_cigar_information: bool,
    hasher: Murmur3,
}

impl DuplicateScoringStrategy {
    /** Per-end cap. Two ends worth of score must not overflow an i16, just as the discount below. */
    const MAX_END_SCORE: i32 = i16::MAX as i32 / 2;
    const QC_FAIL_DISCOUNT: i32 = i16::MIN as i32 / 2;
    const MIN_BASE_QUALITY: u8 = 15;

    pub fn new(strategy: ScoringStrategy, has_mate_cigar_information: bool) -> Result<Self, Error> {
        if strategy == ScoringStrategy::TotalMappedReferenceLength && !has_mate_cigar_information {
            Err(Error::InvalidConfiguration(format!(
                "{} requires mate cigar information; choose another scoring strategy when mate cigars are unavailable",
                strategy
            )))?
        }

        Ok(Self {
            strategy,
            has_mate_cigar_information,
            hasher: Murmur3::new(1),
        })
    }

    pub fn strategy(&self) -> ScoringStrategy {
        self.strategy
    }

    /** Calculates a score for the read which is the sum of scores over Q15. */
    fn get_sum_of_base_qualities(rec: &AlignmentRecord) -> i32 {
        rec.base_qualities
            .iter()
            .filter(|&&q| q >= Self::MIN_BASE_QUALITY)
            .map(|&q| q as i32)
            .sum()
    }

    /// Random number between `i16::MIN / 4` and `i16::MAX / 4`, stable for a given read name.
    fn random_score(&self, name: &str) -> i32 {
        (self.hasher.hash_bytes(name.as_bytes()) & 0b11_1111_1111_1111) as i32 - i16::MAX as i32 / 4
    }

    /// Score of one end, computed from the record alone.
    pub fn compute_duplicate_score(&self, rec: &AlignmentRecord) -> i32 {
        let mut score = match self.strategy {
            ScoringStrategy::SumOfBaseQualities => {
                Self::get_sum_of_base_qualities(rec).min(Self::MAX_END_SCORE)
            }
            ScoringStrategy::TotalMappedReferenceLength => {
                if rec.mapped {
                    rec.cigar.reference_length().min(Self::MAX_END_SCORE as i64) as i32
                } else {
                    0
                }
            }
            ScoringStrategy::Random => self.random_score(&rec.name),
        };

        // filter-failing records are heavily discounted, at most once per end.
        if rec.qc_fail {
            score += Self::QC_FAIL_DISCOUNT;
        }

        score
    }

    /// Score of the mate end as far as it can be known without the mate record.
    fn mate_score_from_cigar(&self, rec: &AlignmentRecord) -> Option<i32> {
        if !(rec.is_paired_and_both_mapped() && self.has_mate_cigar_information) {
            return None;
        }

        match self.strategy {
            ScoringStrategy::TotalMappedReferenceLength => rec
                .mate_cigar
                .as_ref()
                .map(|c| c.reference_length().min(Self::MAX_END_SCORE as i64) as i32),
            ScoringStrategy::Random => Some(self.random_score(&rec.name)),
            ScoringStrategy::SumOfBaseQualities => None,
        }
    }

    /// Initial score of a candidate whose first end is `rec`.
    pub fn candidate_score(&self, rec: &AlignmentRecord) -> CandidateScore {
        CandidateScore {
            own: self.compute_duplicate_score(rec),
            mate_from_cigar: self.mate_score_from_cigar(rec),
            mate_observed: None,
        }
    }

    /// Completes `score` with the mate record once it has been observed.
    pub fn observe_mate(&self, score: &mut CandidateScore, mate: &AlignmentRecord) {
        score.mate_observed = Some(self.compute_duplicate_score(mate));
    }
}
