use clap::ValueEnum;
use macro_sup::set_mlog;
use serde::{Deserialize, Serialize};

use crate::utils::graph_utils::Graph;

use super::{
    physical_location::{PhysicalLocation, PhysicalLocationInt},
    read_name_parser::ReadNameParser,
};

set_mlog!(stringify!(OpticalDuplicateFinder));

#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceMetric {
    #[value(name = "EUCLIDEAN")]
    Euclidean,
    /// Largest of the x and y offsets.
    #[default]
    #[value(name = "CHEBYSHEV")]
    Chebyshev,
}

impl DistanceMetric {
    fn within(&self, lhs: &PhysicalLocationInt, rhs: &PhysicalLocationInt, pixel_distance: i32) -> bool {
        let dx = (lhs.get_x() as i64 - rhs.get_x() as i64).abs();
        let dy = (lhs.get_y() as i64 - rhs.get_y() as i64).abs();
        let d = pixel_distance as i64;

        match self {
            DistanceMetric::Euclidean => dx * dx + dy * dy <= d * d,
            DistanceMetric::Chebyshev => dx <= d && dy <= d,
        }
    }
}

/// A member of a duplicate set as seen by optical clustering.
#[derive(Clone, Debug, PartialEq)]
pub struct OpticalMember {
    pub read_group: Option<String>,
    pub location: Option<PhysicalLocationInt>,
}

/// Indices (into the member slice) of members chain-connected within the pixel distance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpticalCluster {
    pub members: Vec<usize>,
}

/**
 * Finds sets of reads that are close enough on the flowcell to be optical duplicates of one
 * another. Members without a location are never optical.
 */
#[derive(Debug, Clone)]
pub struct OpticalDuplicateFinder {
    pub optical_duplicate_pixel_distance: i32,
    pub distance_metric: DistanceMetric,
    big_duplicate_set_size: usize,
    max_duplicate_set_size: usize,

    rnp: Option<ReadNameParser>,
}

impl Default for OpticalDuplicateFinder {
    fn default() -> Self {
        Self {
            optical_duplicate_pixel_distance: Self::DEFAULT_OPTICAL_DUPLICATE_DISTANCE,
            distance_metric: DistanceMetric::default(),
            big_duplicate_set_size: Self::DEFAULT_BIG_DUPLICATE_SET_SIZE,
            max_duplicate_set_size: Self::DEFAULT_MAX_DUPLICATE_SET_SIZE,
            rnp: Some(ReadNameParser::new()),
        }
    }
}

impl OpticalDuplicateFinder {
    pub const DEFAULT_OPTICAL_DUPLICATE_DISTANCE: i32 = 100;
    pub const DEFAULT_MAX_DUPLICATE_SET_SIZE: usize = 300000;
    pub const DEFAULT_BIG_DUPLICATE_SET_SIZE: usize = 1000;

    pub fn new(
        optical_duplicate_pixel_distance: i32,
        distance_metric: DistanceMetric,
        max_duplicate_set_size: usize,
        rnp: Option<ReadNameParser>,
    ) -> Self {
        Self {
            optical_duplicate_pixel_distance,
            distance_metric,
            max_duplicate_set_size,
            rnp,
            ..Default::default()
        }
    }

    /// The record's own location, otherwise whatever can be parsed from its name.
    pub fn location_of(
        &mut self,
        read_name: &str,
        location: Option<PhysicalLocationInt>,
    ) -> Option<PhysicalLocationInt> {
        if let Some(loc) = location.filter(|l| l.has_location()) {
            return Some(loc);
        }

        let rnp = self.rnp.as_mut()?;
        let mut loc = PhysicalLocationInt::default();
        if rnp.add_location_information(read_name, &mut loc) {
            Some(loc)
        } else {
            None
        }
    }

    fn close_enough(&self, lhs: &OpticalMember, rhs: &OpticalMember) -> bool {
        match (&lhs.location, &rhs.location) {
            (Some(l), Some(r)) => {
                lhs.read_group == rhs.read_group
                    && l.get_tile() == r.get_tile()
                    && self
                        .distance_metric
                        .within(l, r, self.optical_duplicate_pixel_distance)
            }
            _ => false,
        }
    }

    /// Connected components over members that have a location. `None` when the set is too large
    /// to compare pairwise.
    pub fn cluster(&self, members: &[OpticalMember]) -> Option<Vec<OpticalCluster>> {
        let located = members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.location.is_some())
            .map(|(i, _)| i)
            .collect::<Vec<usize>>();

        if located.len() > self.max_duplicate_set_size {
            mlog::warn!(
                "Skipping optical duplicate detection for a duplicate set of {} reads; \
                it exceeds the maximum set size of {}.",
                located.len(),
                self.max_duplicate_set_size
            );
            return None;
        }

        if located.len() > self.big_duplicate_set_size {
            mlog::debug!(
                "Large duplicate set. size = {}",
                located.len()
            );
        }

        // nodes go in first so that components list members in preference order
        let mut graph = Graph::<usize>::new();
        for &i in &located {
            graph.add_node(i);
        }
        for (n, &i) in located.iter().enumerate() {
            for &j in &located[n + 1..] {
                if self.close_enough(&members[i], &members[j]) {
                    graph.add_edge(i, j);
                }
            }
        }

        Some(
            graph
                .components()
                .into_iter()
                .map(|members| OpticalCluster { members })
                .collect(),
        )
    }

    /**
     * Flags optical duplicates among `members`, ordered from most to least preferred; index 0 is
     * the representative. Within a cluster containing the representative every other member is
     * optical. In any other cluster the most preferred member stays a PCR duplicate and the rest
     * are optical. `None` when clustering was skipped.
     */
    pub fn find_optical_duplicates(&self, members: &[OpticalMember]) -> Option<Vec<bool>> {
        let mut optical = vec![false; members.len()];
        if members.len() < 2 {
            return Some(optical);
        }

        for cluster in self.cluster(members)? {
            // members were pushed in index order, so the first is the most preferred
            for &i in cluster.members.iter().skip(1) {
                optical[i] = true;
            }
        }

        Some(optical)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn member(rg: &str, tile: i16, x: i32, y: i32) -> OpticalMember {
        OpticalMember {
            read_group: Some(rg.to_string()),
            location: Some(PhysicalLocationInt { tile, x, y }),
        }
    }

    #[test]
    fn metrics() {
        let a = PhysicalLocationInt { tile: 1, x: 0, y: 0 };
        let b = PhysicalLocationInt { tile: 1, x: 80, y: 80 };

        assert!(DistanceMetric::Chebyshev.within(&a, &b, 100));
        assert!(!DistanceMetric::Euclidean.within(&a, &b, 100));
        assert!(DistanceMetric::Euclidean.within(&a, &b, 114));
    }

    #[test]
    fn clusters_chain_and_respect_tile_and_read_group() {
        let finder = OpticalDuplicateFinder::default();
        let members = vec![
            member("rg1", 1, 0, 0),
            member("rg1", 1, 90, 0),
            member("rg1", 1, 180, 0),
            member("rg1", 2, 0, 0),
            member("rg2", 1, 0, 0),
            OpticalMember { read_group: Some("rg1".to_string()), location: None },
        ];

        let clusters = finder.cluster(&members).unwrap();
        assert_eq!(
            clusters,
            vec![
                OpticalCluster { members: vec![0, 1, 2] },
                OpticalCluster { members: vec![3] },
                OpticalCluster { members: vec![4] },
            ]
        );
    }

    #[test]
    fn representative_cluster_and_other_clusters() {
        let finder = OpticalDuplicateFinder::default();
        let members = vec![
            member("rg1", 1, 0, 0),
            member("rg1", 1, 5000, 5000),
            member("rg1", 1, 10, 10),
            member("rg1", 1, 5010, 5010),
            member("rg1", 1, 20000, 20000),
        ];

        assert_eq!(
            finder.find_optical_duplicates(&members).unwrap(),
            vec![false, false, true, true, false]
        );
    }

    #[test]
    fn oversized_sets_are_skipped() {
        let finder = OpticalDuplicateFinder::new(100, DistanceMetric::Chebyshev, 2, None);
        let members = vec![member("rg1", 1, 0, 0); 3];

        assert_eq!(finder.find_optical_duplicates(&members), None);
    }

    #[test]
    fn locations_come_from_names_when_missing() {
        let mut finder = OpticalDuplicateFinder::default();

        assert_eq!(
            finder.location_of("RUNID:7:1203:2886:82292", None),
            Some(PhysicalLocationInt { tile: 1203, x: 2886, y: 82292 })
        );
        let own = PhysicalLocationInt { tile: 3, x: 4, y: 5 };
        assert_eq!(finder.location_of("RUNID:7:1203:2886:82292", Some(own)), Some(own));

        let mut no_parser = OpticalDuplicateFinder::new(100, DistanceMetric::Chebyshev, 10, None);
        assert_eq!(no_parser.location_of("RUNID:7:1203:2886:82292", None), None);
    }
}
