//! Property records shared by every parcel index.
#![deny(missing_docs)]

mod codec;
mod error;

pub use codec::{read_records, write_records};
pub use error::RecordError;

use serde::{Deserialize, Serialize};

/// A position on the 2-D map plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate, growing downwards.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance_squared(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// True if both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Street address, e.g. `1234 sw 46th st`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    /// House number (`1234`).
    pub house_number: String,
    /// Cardinal direction (`sw`).
    pub cardinal: String,
    /// Road number with ordinal suffix (`46th`).
    pub road_number: String,
    /// Road type (`st`, `ave`).
    pub road_type: String,
}

/// A single property listing.
///
/// Only `position` and `price` matter to the indexes; the remaining fields
/// are carried through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Street address.
    pub address: Address,
    /// Location on the map plane.
    pub position: Point,
    /// Asking price.
    pub price: f64,
    /// Floor area.
    pub area: f64,
    /// Number of rooms.
    pub room_count: u32,
    /// Number of bathrooms.
    pub bathroom_count: u32,
    /// Free-form feature list, e.g. `Pool, Fireplace`.
    pub features: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_squared_is_symmetric() {
        let a = Point::new(1.0, 2.0);
        let b = Point::new(4.0, 6.0);
        assert_eq!(a.distance_squared(&b), 25.0);
        assert_eq!(b.distance_squared(&a), 25.0);
    }

    #[test]
    fn non_finite_points_are_detected() {
        assert!(Point::new(0.0, -3.5).is_finite());
        assert!(!Point::new(f64::NAN, 0.0).is_finite());
        assert!(!Point::new(0.0, f64::INFINITY).is_finite());
    }
}
