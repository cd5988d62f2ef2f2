use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt::Display,
};

/**
 * Histogram type data. Stored internally in a sorted map so that bins can be iterated in order.
 */
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Histogram<N> {
    map: BTreeMap<N, Bin<N>>,
    bin_label: String,
    value_label: String,
}

impl<N> Default for Histogram<N> {
    fn default() -> Self {
        Self {
            map: BTreeMap::new(),
            bin_label: "BIN".to_string(),
            value_label: "VALUE".to_string(),
        }
    }
}

impl<N> Histogram<N>
where
    N: Ord + Copy + Into<f64>,
{
    /** Constructs a new Histogram with supplied bin and value labels. */
    pub(crate) fn from_labels<S: ToString>(bin_label: S, value_label: S) -> Self {
        Self {
            bin_label: bin_label.to_string(),
            value_label: value_label.to_string(),
            ..Default::default()
        }
    }

    /** Increments the value in the designated bin by the supplied increment. */
    pub(crate) fn increment(&mut self, id: N, increment: f64) {
        match self.map.entry(id) {
            Entry::Vacant(ent) => {
                ent.insert(Bin { id, value: increment });
            }
            Entry::Occupied(mut ent) => ent.get_mut().value += increment,
        }
    }

    pub(crate) fn increment1(&mut self, id: N) {
        self.increment(id, 1.0);
    }

    /** Mean of all the items added to the histogram, weighting each bin id by its count. */
    pub(crate) fn get_mean(&self) -> f64 {
        let (mut product, mut total_count) = (0.0, 0.0);
        for bin in self.map.values() {
            product += bin.get_id_value() * bin.value;
            total_count += bin.value;
        }

        product / total_count
    }

    /** Sum of the products of the bin ids and the number of entries in each bin. */
    pub(crate) fn get_sum(&self) -> f64 {
        self.map.values().map(|b| b.value * b.get_id_value()).sum()
    }

    /** Sum of the number of entries in each bin. */
    pub(crate) fn get_sum_of_values(&self) -> f64 {
        self.map.values().map(|b| b.value).sum()
    }

    #[cfg(test)]
    pub(crate) fn size(&self) -> usize {
        self.map.len()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, key: &N) -> Option<&Bin<N>> {
        self.map.get(key)
    }

    pub(crate) fn bins(&self) -> impl Iterator<Item = &Bin<N>> {
        self.map.values()
    }
}

impl<N> Display for Histogram<N>
where
    N: Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}\t{}", self.bin_label, self.value_label)?;
        for bin in self.map.values() {
            writeln!(f, "{}\t{}", bin.id, bin.value)?;
        }

        Ok(())
    }
}

/** Represents a bin in the Histogram. */
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Bin<N> {
    id: N,
    value: f64,
}

impl<N> Bin<N>
where
    N: Copy + Into<f64>,
{
    pub(crate) fn get_id(&self) -> N {
        self.id
    }

    pub(crate) fn get_value(&self) -> f64 {
        self.value
    }

    fn get_id_value(&self) -> f64 {
        self.id.into()
    }
}
