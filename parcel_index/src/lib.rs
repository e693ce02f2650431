//! In-memory indexes over property records: a growing quadtree for radius
//! lookups, and a red-black tree and a B+Tree for price ranges.
#![deny(missing_docs)]

pub mod bplus;
mod error;
pub mod quadtree;
pub mod redblack;

pub use bplus::BPlusTree;
pub use error::IndexError;
pub use quadtree::{Bounds, Quadrant, Quadtree};
pub use redblack::{Color, RedBlackTree};

use parcel_record::{Point, Record};

/// Radius lookups over record positions.
pub type SpatialIndex = Quadtree<Record>;
/// Price-ordered records backed by a red-black tree.
pub type OrderedIndex = RedBlackTree<Record>;
/// Price-ordered records backed by a B+Tree.
pub type MultiwayIndex = BPlusTree<f64, Record>;

/// Items with a position on the map plane.
pub trait Located {
    /// Position used for spatial indexing.
    fn location(&self) -> Point;
}

/// Items ordered by a scalar key.
pub trait Keyed {
    /// Ordering key.
    fn key(&self) -> f64;
}

impl Located for Point {
    fn location(&self) -> Point {
        *self
    }
}

impl Located for Record {
    fn location(&self) -> Point {
        self.position
    }
}

impl Keyed for f64 {
    fn key(&self) -> f64 {
        *self
    }
}

impl Keyed for Record {
    fn key(&self) -> f64 {
        self.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn record(i: usize, x: f64, y: f64, price: f64) -> Record {
        Record {
            position: Point::new(x, y),
            price,
            room_count: i as u32,
            ..Default::default()
        }
    }

    fn ids(records: Vec<&Record>) -> Vec<u32> {
        let mut ids: Vec<u32> = records.iter().map(|r| r.room_count).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn range_backends_agree() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut ordered = OrderedIndex::new();
        let mut multiway = MultiwayIndex::new(5).unwrap();
        for i in 0..3000 {
            // Whole-dollar prices from a narrow band force plenty of ties.
            let price = rng.gen_range(400_000..400_600) as f64;
            let rec = record(i, 0.0, 0.0, price);
            multiway.insert(rec.price, rec.clone());
            ordered.insert(rec);
        }
        ordered.validate().unwrap();
        multiway.validate().unwrap();

        for _ in 0..200 {
            let low = rng.gen_range(399_990..400_610) as f64;
            let high = low + rng.gen_range(0..120) as f64;
            let a = ordered.price_range(low, high);
            let b = multiway.range_query(&low, &high);
            assert!(a.windows(2).all(|w| w[0].price <= w[1].price));
            assert!(b.windows(2).all(|w| w[0].price <= w[1].price));
            assert_eq!(ids(a), ids(b), "[{low}, {high}]");
        }
    }

    #[test]
    fn tied_prices_come_back_in_insertion_order_from_both_backends() {
        let mut ordered = OrderedIndex::new();
        let mut multiway = MultiwayIndex::new(3).unwrap();
        for i in 0..40 {
            let rec = record(i, 0.0, 0.0, if i % 3 == 0 { 10.0 } else { 20.0 });
            multiway.insert(rec.price, rec.clone());
            ordered.insert(rec);
        }
        let a: Vec<u32> = ordered.price_range(10.0, 10.0).iter().map(|r| r.room_count).collect();
        let b: Vec<u32> = multiway.range_query(&10.0, &10.0).iter().map(|r| r.room_count).collect();
        let expected: Vec<u32> = (0..40).filter(|i| i % 3 == 0).collect();
        assert_eq!(a, expected);
        assert_eq!(b, expected);
    }

    #[test]
    fn spatial_index_over_records() {
        let mut spatial = SpatialIndex::with_bounds(Bounds::new(0.0, 100.0, 0.0, 100.0)).unwrap();
        spatial.insert(record(1, 10.0, 10.0, 1.0)).unwrap();
        spatial.insert(record(2, 13.0, 14.0, 1.0)).unwrap();
        spatial.insert(record(3, 90.0, 90.0, 1.0)).unwrap();
        spatial.insert(record(4, 250.0, -40.0, 1.0)).unwrap();
        spatial.validate().unwrap();
        assert_eq!(ids(spatial.find_in_radius(Point::new(10.0, 10.0), 5.0)), vec![1, 2]);
        assert_eq!(ids(spatial.find_in_radius(Point::new(250.0, -40.0), 1.0)), vec![4]);
    }
}
