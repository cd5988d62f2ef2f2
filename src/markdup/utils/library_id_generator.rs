use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::{
    hts::utils::histogram::{Bin, Histogram},
    utils::errors::Error,
};

/// Per-library duplicate-set-size histograms, exported in the run summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibraryHistograms {
    pub duplicate_sets: BTreeMap<u32, u64>,
    pub optical_sets: BTreeMap<u32, u64>,
    pub non_optical_sets: BTreeMap<u32, u64>,
    pub optical_duplicates: u64,
}

#[derive(Debug)]
struct LibraryCounts {
    duplicate_count_hist: Histogram<u32>,
    non_optical_duplicate_count_hist: Histogram<u32>,
    optical_duplicate_count_hist: Histogram<u32>,
    optical_duplicates: u64,
}

impl LibraryCounts {
    fn new() -> Self {
        Self {
            duplicate_count_hist: Histogram::from_labels("set_size", "all_sets"),
            non_optical_duplicate_count_hist: Histogram::from_labels("set_size", "non_optical_sets"),
            optical_duplicate_count_hist: Histogram::from_labels("set_size", "optical_sets"),
            optical_duplicates: 0,
        }
    }
}

/**
 * Maps library names to compact ids and tracks, per library, how large the emitted duplicate sets
 * were and how many of their members were optical duplicates.
 */
#[derive(Debug)]
pub(crate) struct LibraryIdGenerator {
    library_ids: HashMap<String, i16>, // from library string to library id
    library_names: Vec<String>,
    counts: Vec<LibraryCounts>,
}

impl LibraryIdGenerator {
    pub(crate) fn new() -> Self {
        Self {
            library_ids: HashMap::new(),
            library_names: Vec::new(),
            counts: Vec::new(),
        }
    }

    /** Get the library ID for the given library name, assigning the next free id on first sight. */
    pub(crate) fn get_library_id(&mut self, library: &str) -> Result<i16, Error> {
        if let Some(&id) = self.library_ids.get(library) {
            return Ok(id);
        }

        let id = i16::try_from(self.library_names.len() + 1).map_err(|_| {
            Error::InvalidConfiguration(format!(
                "library {} exceeds the limit of {} distinct libraries",
                library,
                i16::MAX
            ))
        })?;
        self.library_ids.insert(library.to_string(), id);
        self.library_names.push(library.to_string());
        self.counts.push(LibraryCounts::new());

        Ok(id)
    }

    #[cfg(test)]
    pub(crate) fn get_library_name(&self, library_id: i16) -> Option<&str> {
        self.library_names
            .get((library_id as usize).checked_sub(1)?)
            .map(|s| s.as_str())
    }

    fn counts_mut(&mut self, library_id: i16) -> Option<&mut LibraryCounts> {
        self.counts.get_mut((library_id as usize).checked_sub(1)?)
    }

    /// Records one closed duplicate set with `set_size` members of which `optical` were optical duplicates.
    pub(crate) fn track_duplicate_set(&mut self, library_id: i16, set_size: u32, optical: u32) {
        if let Some(counts) = self.counts_mut(library_id) {
            counts.duplicate_count_hist.increment1(set_size);
            // a set is optical if any of its members are optical duplicates
            if optical > 0 {
                counts.optical_duplicate_count_hist.increment1(set_size);
            } else {
                counts.non_optical_duplicate_count_hist.increment1(set_size);
            }
            counts.optical_duplicates += optical as u64;
        }
    }

    pub(crate) fn get_number_of_optical_duplicates(&self) -> u64 {
        self.counts.iter().map(|c| c.optical_duplicates).sum()
    }

    pub(crate) fn histograms(&self) -> BTreeMap<String, LibraryHistograms> {
        let to_map = |histo: &Histogram<u32>| {
            histo
                .bins()
                .map(|b: &Bin<u32>| (b.get_id(), b.get_value() as u64))
                .collect::<BTreeMap<u32, u64>>()
        };

        self.library_names
            .iter()
            .zip(&self.counts)
            .map(|(name, counts)| {
                (
                    name.clone(),
                    LibraryHistograms {
                        duplicate_sets: to_map(&counts.duplicate_count_hist),
                        optical_sets: to_map(&counts.optical_duplicate_count_hist),
                        non_optical_sets: to_map(&counts.non_optical_duplicate_count_hist),
                        optical_duplicates: counts.optical_duplicates,
                    },
                )
            })
            .collect()
    }

    /// Tab separated dump of the set size histograms, one block per library.
    pub(crate) fn format_histograms(&self) -> String {
        self.library_names
            .iter()
            .zip(&self.counts)
            .map(|(name, counts)| {
                format!(
                    "## {} ({} sets, {} reads, mean set size {:.2})\n{}{}{}",
                    name,
                    counts.duplicate_count_hist.get_sum_of_values(),
                    counts.duplicate_count_hist.get_sum(),
                    counts.duplicate_count_hist.get_mean(),
                    counts.duplicate_count_hist,
                    counts.optical_duplicate_count_hist,
                    counts.non_optical_duplicate_count_hist
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
