use serde::{Deserialize, Serialize};

use crate::{
    hts::duplicate_scoring_strategy::{DuplicateScoringStrategy, ScoringStrategy},
    utils::errors::Error,
};

use super::utils::{
    optical_duplicate_finder::{DistanceMetric, OpticalDuplicateFinder},
    read_name_parser::{ReadNameParser, DEFAULT_READ_NAME_REGEX},
};

/// Everything a duplicate marking pass can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkDuplicatesConfig {
    /// Largest soft clip the window must tolerate: records are kept until the window has moved
    /// this many bases past their unclipped position.
    pub minimum_distance: i64,
    pub optical_duplicate_pixel_distance: i32,
    pub distance_metric: DistanceMetric,
    pub scoring_strategy: ScoringStrategy,
    /// Trust the mate cigar cached on each record to place the mate before it is seen.
    pub has_mate_cigar_information: bool,
    /// Regex with tile, x and y capture groups. `None` disables parsing locations from read names.
    pub read_name_regex: Option<String>,
    pub max_duplicate_set_size: usize,
    /// Log progress every this many records; 0 turns progress logging off.
    pub progress_interval: usize,
}

impl MarkDuplicatesConfig {
    pub const DEFAULT_PROGRESS_INTERVAL: usize = 100000;

    pub fn new(minimum_distance: i64) -> Self {
        Self {
            minimum_distance,
            optical_duplicate_pixel_distance: OpticalDuplicateFinder::DEFAULT_OPTICAL_DUPLICATE_DISTANCE,
            distance_metric: DistanceMetric::default(),
            scoring_strategy: ScoringStrategy::default(),
            has_mate_cigar_information: true,
            read_name_regex: Some(DEFAULT_READ_NAME_REGEX.to_string()),
            max_duplicate_set_size: OpticalDuplicateFinder::DEFAULT_MAX_DUPLICATE_SET_SIZE,
            progress_interval: Self::DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.minimum_distance < 0 {
            Err(Error::InvalidConfiguration(format!(
                "MINIMUM_DISTANCE must not be negative (was {})",
                self.minimum_distance
            )))?
        }

        if self.optical_duplicate_pixel_distance < 0 {
            Err(Error::InvalidConfiguration(format!(
                "OPTICAL_DUPLICATE_PIXEL_DISTANCE must not be negative (was {})",
                self.optical_duplicate_pixel_distance
            )))?
        }

        if self.max_duplicate_set_size == 0 {
            Err(Error::InvalidConfiguration(
                "MAX_OPTICAL_DUPLICATE_SET_SIZE must be positive".to_string(),
            ))?
        }

        DuplicateScoringStrategy::new(self.scoring_strategy, self.has_mate_cigar_information)?;
        self.read_name_parser()?;

        Ok(())
    }

    pub(crate) fn read_name_parser(&self) -> Result<Option<ReadNameParser>, Error> {
        self.read_name_regex
            .as_deref()
            .map(ReadNameParser::with_regex)
            .transpose()
    }

    pub(crate) fn optical_duplicate_finder(&self) -> Result<OpticalDuplicateFinder, Error> {
        Ok(OpticalDuplicateFinder::new(
            self.optical_duplicate_pixel_distance,
            self.distance_metric,
            self.max_duplicate_set_size,
            self.read_name_parser()?,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = MarkDuplicatesConfig::new(300);

        assert_eq!(config.optical_duplicate_pixel_distance, 100);
        assert_eq!(config.distance_metric, DistanceMetric::Chebyshev);
        assert_eq!(config.scoring_strategy, ScoringStrategy::TotalMappedReferenceLength);
        assert!(config.has_mate_cigar_information);
        assert_eq!(config.max_duplicate_set_size, 300000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_configurations() {
        let mut negative = MarkDuplicatesConfig::new(-1);
        assert!(negative.validate().is_err());
        negative.minimum_distance = 0;
        assert!(negative.validate().is_ok());

        let mut no_mate_cigars = MarkDuplicatesConfig::new(100);
        no_mate_cigars.has_mate_cigar_information = false;
        assert!(matches!(no_mate_cigars.validate(), Err(Error::InvalidConfiguration(_))));
        no_mate_cigars.scoring_strategy = ScoringStrategy::SumOfBaseQualities;
        assert!(no_mate_cigars.validate().is_ok());

        let mut bad_regex = MarkDuplicatesConfig::new(100);
        bad_regex.read_name_regex = Some("([0-9]+".to_string());
        assert!(bad_regex.validate().is_err());
        bad_regex.read_name_regex = None;
        assert!(bad_regex.validate().is_ok());
    }

    #[test]
    fn deserializes_with_screaming_enum_names() {
        let config: MarkDuplicatesConfig = serde_json::from_str(
            r#"{"minimum_distance":990,"optical_duplicate_pixel_distance":2500,"distance_metric":"EUCLIDEAN",
                "scoring_strategy":"SUM_OF_BASE_QUALITIES","has_mate_cigar_information":true,
                "read_name_regex":null,"max_duplicate_set_size":1000,"progress_interval":0}"#,
        )
        .unwrap();

        assert_eq!(config.distance_metric, DistanceMetric::Euclidean);
        assert_eq!(config.scoring_strategy, ScoringStrategy::SumOfBaseQualities);
        assert_eq!(config.read_name_regex, None);
    }
}
