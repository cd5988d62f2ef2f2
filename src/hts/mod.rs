pub mod cigar;
pub mod duplicate_scoring_strategy;
pub mod record;
pub(crate) mod utils;
