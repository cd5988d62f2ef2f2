pub mod cmdline;
pub mod hts;
pub mod markdup;
pub mod utils;

#[cfg(test)]
mod tests;

pub use hts::{
    cigar::Cigar,
    duplicate_scoring_strategy::ScoringStrategy,
    record::{AlignmentRecord, AlignmentRecordBuilder},
};
pub use markdup::{
    config::MarkDuplicatesConfig,
    markduplicates::{
        DuplicateMarker, DuplicationSummary, MarkDuplicatesIterator, MarkedRecord, Provenance,
    },
    utils::optical_duplicate_finder::DistanceMetric,
};
pub use utils::errors::Error;
