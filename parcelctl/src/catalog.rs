//! The three indexes built over one record set.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use parcel_index::{Bounds, IndexError, MultiwayIndex, OrderedIndex, SpatialIndex};
use parcel_record::{read_records, Record};
use serde::Serialize;
use tracing::info;

pub struct Catalog {
    spatial: SpatialIndex,
    ordered: OrderedIndex,
    multiway: MultiwayIndex,
}

/// Shape of the loaded indexes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub records: usize,
    pub spatial_bounds: Bounds,
    pub quadtree_depth: usize,
    pub redblack_black_height: usize,
    pub bplus_order: usize,
    pub bplus_height: usize,
}

impl Catalog {
    pub fn new(order: usize, bounds: Bounds) -> Result<Self, IndexError> {
        Ok(Self {
            spatial: SpatialIndex::with_bounds(bounds)?,
            ordered: OrderedIndex::new(),
            multiway: MultiwayIndex::new(order)?,
        })
    }

    pub fn from_records(
        order: usize,
        bounds: Bounds,
        records: Vec<Record>,
    ) -> Result<Self, IndexError> {
        let mut catalog = Self::new(order, bounds)?;
        for record in records {
            catalog.insert(record)?;
        }
        Ok(catalog)
    }

    /// Parse the record file at `path` and index every record.
    pub fn open(order: usize, bounds: Bounds, path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let records = read_records(BufReader::new(file))
            .with_context(|| format!("reading {}", path.display()))?;
        let catalog = Self::from_records(order, bounds, records)?;
        info!(path = %path.display(), records = catalog.len(), "loaded record file");
        Ok(catalog)
    }

    /// Add one record to every index. The spatial insert runs first so a
    /// rejected position leaves all three untouched.
    pub fn insert(&mut self, record: Record) -> Result<(), IndexError> {
        self.spatial.insert(record.clone())?;
        self.ordered.insert(record.clone());
        self.multiway.insert(record.price, record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    pub fn ordered(&self) -> &OrderedIndex {
        &self.ordered
    }

    pub fn multiway(&self) -> &MultiwayIndex {
        &self.multiway
    }

    pub fn stats(&self) -> Stats {
        Stats {
            records: self.len(),
            spatial_bounds: self.spatial.bounds(),
            quadtree_depth: self.spatial.depth(),
            redblack_black_height: self.ordered.black_height(),
            bplus_order: self.multiway.order(),
            bplus_height: self.multiway.height(),
        }
    }

    /// Structural check of each index, labelled by structure.
    pub fn validate(&self) -> Vec<(&'static str, Result<(), IndexError>)> {
        vec![
            ("quadtree", self.spatial.validate()),
            ("red-black", self.ordered.validate()),
            ("b+ tree", self.multiway.validate()),
        ]
    }
}

/// Whether two result sets hold the same records with the same multiplicity.
pub fn same_multiset(a: &[&Record], b: &[&Record]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left = a.to_vec();
    let mut right = b.to_vec();
    left.sort_by(|x, y| x.price.total_cmp(&y.price));
    right.sort_by(|x, y| x.price.total_cmp(&y.price));

    // Pair records within each run of equal prices.
    let mut start = 0;
    while start < left.len() {
        let price = left[start].price;
        let end = start + left[start..].iter().take_while(|r| r.price == price).count();
        let mut pool = right[start..end].to_vec();
        for record in &left[start..end] {
            match pool.iter().position(|r| r == record) {
                Some(i) => {
                    pool.swap_remove(i);
                }
                None => return false,
            }
        }
        start = end;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_record::Point;

    fn sample() -> Vec<Record> {
        [
            "10 nw 1st st 0.10 0.10 100000.00 900.00 2 1 Garden",
            "11 nw 1st st 0.20 0.15 250000.00 1200.00 3 2",
            "12 ne 2nd ave 0.80 0.20 250000.00 1300.00 3 2 Pool",
            "13 se 3rd ct 0.70 0.90 410000.00 2100.00 4 3 Pool, Dock",
            "14 sw 4th ln 0.05 0.95 75000.00 650.00 1 1",
        ]
        .iter()
        .map(|l| l.parse().unwrap())
        .collect()
    }

    #[test]
    fn every_index_holds_every_record() {
        let catalog = Catalog::from_records(3, Bounds::default(), sample()).unwrap();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.spatial().len(), 5);
        assert_eq!(catalog.multiway().len(), 5);
        assert!(catalog.validate().iter().all(|(_, r)| r.is_ok()));

        let near = catalog.spatial().find_in_radius(Point::new(0.15, 0.12), 0.1);
        assert_eq!(near.len(), 2);
        let a = catalog.ordered().price_range(200000.0, 300000.0);
        let b = catalog.multiway().range_query(&200000.0, &300000.0);
        assert_eq!(a.len(), 2);
        assert!(same_multiset(&a, &b));
    }

    #[test]
    fn stats_reflect_configuration() {
        let bounds = Bounds::new(0.0, 2.0, 0.0, 2.0);
        let catalog = Catalog::from_records(4, bounds, sample()).unwrap();
        let stats = catalog.stats();
        assert_eq!(stats.records, 5);
        assert_eq!(stats.bplus_order, 4);
        assert_eq!(stats.bplus_height, 2);
        assert_eq!(stats.spatial_bounds, bounds);
        assert!(stats.quadtree_depth >= 1);
        assert!(stats.redblack_black_height >= 1);
    }

    #[test]
    fn positions_outside_bounds_expand_the_quadtree() {
        let mut records = sample();
        records[0].position = Point::new(-3.0, 4.5);
        let catalog = Catalog::from_records(8, Bounds::default(), records).unwrap();
        assert!(catalog.spatial().bounds().contains(&Point::new(-3.0, 4.5)));
        assert!(catalog.spatial().validate().is_ok());
    }

    #[test]
    fn bad_parameters_are_rejected() {
        assert!(matches!(
            Catalog::new(2, Bounds::default()),
            Err(IndexError::InvalidOrder { .. })
        ));
        assert!(Catalog::new(8, Bounds::new(1.0, 0.0, 0.0, 1.0)).is_err());
    }

    #[test]
    fn multiset_comparison_counts_duplicates() {
        let recs = sample();
        assert!(same_multiset(&[&recs[1], &recs[2]], &[&recs[2], &recs[1]]));
        assert!(!same_multiset(&[&recs[1], &recs[1]], &[&recs[1], &recs[2]]));
        assert!(!same_multiset(&[&recs[1]], &[]));
    }

    #[test]
    fn multiset_comparison_sees_past_display_rounding() {
        let recs = sample();
        let mut close = recs[1].clone();
        close.area += 0.001;
        assert_eq!(close.to_string(), recs[1].to_string());
        assert!(!same_multiset(&[&recs[1]], &[&close]));
        assert!(same_multiset(&[&recs[1], &close], &[&close, &recs[1]]));
    }
}
