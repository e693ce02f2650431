//! Point quadtree that grows its root bounds on demand.
//!
//! Each node holds at most one item directly and subdivides lazily: a child
//! quadrant is only created once a second item lands in the node. Inserting
//! a point outside the current root doubles the root towards that point and
//! hangs the old root under the new one as a single quadrant, so nothing is
//! rebuilt.

use parcel_record::Point;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{IndexError, Located};

/// Axis-aligned half-open rectangle `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Inclusive left edge.
    pub left: f64,
    /// Exclusive right edge.
    pub right: f64,
    /// Inclusive top edge.
    pub top: f64,
    /// Exclusive bottom edge.
    pub bottom: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0)
    }
}

impl Bounds {
    /// Create a rectangle from its four edges.
    pub const fn new(left: f64, right: f64, top: f64, bottom: f64) -> Self {
        Self { left, right, top, bottom }
    }

    /// Horizontal extent.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Vertical extent.
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// True if `p` lies inside the half-open rectangle.
    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.left && p.x < self.right && p.y >= self.top && p.y < self.bottom
    }

    /// Squared distance from `p` to the nearest point of the rectangle, 0 when inside.
    pub fn min_distance_squared(&self, p: &Point) -> f64 {
        let dx = (self.left - p.x).max(p.x - self.right).max(0.0);
        let dy = (self.top - p.y).max(p.y - self.bottom).max(0.0);
        dx * dx + dy * dy
    }

    fn validate(&self) -> Result<(), IndexError> {
        let finite = [self.left, self.right, self.top, self.bottom]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.left >= self.right || self.top >= self.bottom {
            return Err(IndexError::InvalidBounds {
                left: self.left,
                right: self.right,
                top: self.top,
                bottom: self.bottom,
            });
        }
        Ok(())
    }
}

/// One of the four sub-rectangles of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    /// Top-left.
    NorthWest = 0,
    /// Top-right.
    NorthEast = 1,
    /// Bottom-left.
    SouthWest = 2,
    /// Bottom-right.
    SouthEast = 3,
}

impl Quadrant {
    /// Quadrants in traversal order.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    fn from_sides(west: bool, north: bool) -> Self {
        match (west, north) {
            (true, true) => Quadrant::NorthWest,
            (false, true) => Quadrant::NorthEast,
            (true, false) => Quadrant::SouthWest,
            (false, false) => Quadrant::SouthEast,
        }
    }

    fn is_west(self) -> bool {
        matches!(self, Quadrant::NorthWest | Quadrant::SouthWest)
    }

    fn is_north(self) -> bool {
        matches!(self, Quadrant::NorthWest | Quadrant::NorthEast)
    }
}

#[derive(Debug)]
struct QuadNode<T> {
    bounds: Bounds,
    /// Point the node divides its quadrants at.
    split: Point,
    held: Option<T>,
    children: [Option<Box<QuadNode<T>>>; 4],
}

impl<T> QuadNode<T> {
    fn new(bounds: Bounds) -> Self {
        let split = Point::new(
            (bounds.left + bounds.right) / 2.0,
            (bounds.top + bounds.bottom) / 2.0,
        );
        Self::with_split(bounds, split)
    }

    fn with_split(bounds: Bounds, split: Point) -> Self {
        Self {
            bounds,
            split,
            held: None,
            children: [None, None, None, None],
        }
    }

    fn quadrant_of(&self, p: &Point) -> Quadrant {
        Quadrant::from_sides(p.x < self.split.x, p.y < self.split.y)
    }

    fn quadrant_bounds(&self, q: Quadrant) -> Bounds {
        let b = &self.bounds;
        let (left, right) = if q.is_west() {
            (b.left, self.split.x)
        } else {
            (self.split.x, b.right)
        };
        let (top, bottom) = if q.is_north() {
            (b.top, self.split.y)
        } else {
            (self.split.y, b.bottom)
        };
        Bounds::new(left, right, top, bottom)
    }

    fn child_or_create(&mut self, q: Quadrant) -> &mut QuadNode<T> {
        let bounds = self.quadrant_bounds(q);
        self.children[q as usize].get_or_insert_with(|| Box::new(QuadNode::new(bounds)))
    }
}

/// Quadtree keyed by item location.
#[derive(Debug)]
pub struct Quadtree<T> {
    root: QuadNode<T>,
    len: usize,
}

impl<T: Located> Default for Quadtree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Located> Quadtree<T> {
    /// Empty tree over the unit square.
    pub fn new() -> Self {
        Self {
            root: QuadNode::new(Bounds::default()),
            len: 0,
        }
    }

    /// Empty tree with explicit initial bounds.
    pub fn with_bounds(bounds: Bounds) -> Result<Self, IndexError> {
        bounds.validate()?;
        Ok(Self {
            root: QuadNode::new(bounds),
            len: 0,
        })
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current root rectangle.
    pub fn bounds(&self) -> Bounds {
        self.root.bounds
    }

    /// Insert `item`, expanding the root if its location is out of bounds.
    pub fn insert(&mut self, item: T) -> Result<(), IndexError> {
        let pos = item.location();
        if !pos.is_finite() {
            return Err(IndexError::NonFinitePosition { x: pos.x, y: pos.y });
        }
        while !self.root.bounds.contains(&pos) {
            self.expand_towards(&pos);
        }

        let mut node = &mut self.root;
        while node.held.is_some() {
            let q = node.quadrant_of(&pos);
            node = node.child_or_create(q);
        }
        node.held = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Double the root away from itself towards `target`.
    fn expand_towards(&mut self, target: &Point) {
        let old = self.root.bounds;
        let west = target.x < old.left;
        let north = target.y < old.top;
        let (w, h) = (old.width(), old.height());

        let (left, right, split_x) = if west {
            (old.left - w, old.right, old.left)
        } else {
            (old.left, old.right + w, old.right)
        };
        let (top, bottom, split_y) = if north {
            (old.top - h, old.bottom, old.top)
        } else {
            (old.top, old.bottom + h, old.bottom)
        };
        let grown = Bounds::new(left, right, top, bottom);
        debug!(?old, ?grown, "expanding quadtree root");

        // The old root keeps its rectangle and becomes the quadrant facing away from the target.
        let slot = Quadrant::from_sides(!west, !north);
        let new_root = QuadNode::with_split(grown, Point::new(split_x, split_y));
        let old_root = std::mem::replace(&mut self.root, new_root);
        self.root.children[slot as usize] = Some(Box::new(old_root));
    }

    /// Every item within `radius` of `center` (inclusive), in depth-first
    /// order: a node's own item, then its NW, NE, SW and SE subtrees.
    pub fn find_in_radius(&self, center: Point, radius: f64) -> Vec<&T> {
        let mut result = Vec::new();
        if radius.is_nan() || radius < 0.0 {
            return result;
        }
        let limit = radius * radius;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if node.bounds.min_distance_squared(&center) > limit {
                continue;
            }
            if let Some(item) = &node.held {
                if item.location().distance_squared(&center) <= limit {
                    result.push(item);
                }
            }
            for child in node.children.iter().rev().flatten() {
                stack.push(child);
            }
        }
        result
    }

    /// Longest root-to-node path, counting the root as depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(&self.root, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            for child in node.children.iter().flatten() {
                stack.push((&**child, depth + 1));
            }
        }
        deepest
    }

    /// Check containment, exact quadrant partitioning and the item count.
    pub fn validate(&self) -> Result<(), IndexError> {
        let mut count = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if let Some(item) = &node.held {
                count += 1;
                let p = item.location();
                if !node.bounds.contains(&p) {
                    return Err(IndexError::Invariant(format!(
                        "item at ({}, {}) outside node bounds {:?}",
                        p.x, p.y, node.bounds
                    )));
                }
            }
            for q in Quadrant::ALL {
                if let Some(child) = &node.children[q as usize] {
                    let expected = node.quadrant_bounds(q);
                    if child.bounds != expected {
                        return Err(IndexError::Invariant(format!(
                            "{q:?} child bounds {:?} differ from quadrant {expected:?}",
                            child.bounds
                        )));
                    }
                    stack.push(child);
                }
            }
        }
        if count != self.len {
            return Err(IndexError::Invariant(format!(
                "found {count} items, expected {}",
                self.len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sorted(points: Vec<&Point>) -> Vec<(f64, f64)> {
        let mut out: Vec<_> = points.into_iter().map(|p| (p.x, p.y)).collect();
        out.sort_by(|a, b| a.partial_cmp(b).unwrap());
        out
    }

    fn unit_square_with_outliers() -> Quadtree<Point> {
        let mut tree = Quadtree::new();
        let points = [(0.5, 0.5), (0.25, 0.25), (0.75, 0.25), (0.25, 0.75), (0.75, 0.75)];
        for (x, y) in points {
            tree.insert(Point::new(x, y)).unwrap();
        }
        tree.insert(Point::new(-1.0, -1.0)).unwrap();
        tree.insert(Point::new(2.0, 2.0)).unwrap();
        tree
    }

    #[test]
    fn radius_after_expansion() {
        let tree = unit_square_with_outliers();
        assert_eq!(tree.len(), 7);
        tree.validate().unwrap();

        let hits = sorted(tree.find_in_radius(Point::new(0.5, 0.5), 0.4));
        assert_eq!(
            hits,
            vec![(0.25, 0.25), (0.25, 0.75), (0.5, 0.5), (0.75, 0.25), (0.75, 0.75)]
        );

        let hits = tree.find_in_radius(Point::new(0.5, 0.5), 0.1);
        assert_eq!(hits, vec![&Point::new(0.5, 0.5)]);
    }

    #[test]
    fn expansion_contains_outliers() {
        let tree = unit_square_with_outliers();
        let b = tree.bounds();
        assert!(b.contains(&Point::new(-1.0, -1.0)));
        assert!(b.contains(&Point::new(2.0, 2.0)));
        assert!(b.contains(&Point::new(0.5, 0.5)));
    }

    #[test]
    fn empty_tree_returns_nothing() {
        let tree: Quadtree<Point> = Quadtree::new();
        assert!(tree.is_empty());
        assert!(tree.find_in_radius(Point::new(0.5, 0.5), 10.0).is_empty());
    }

    #[test]
    fn zero_radius_matches_exact_position_and_keeps_duplicates() {
        let mut tree = Quadtree::new();
        for _ in 0..3 {
            tree.insert(Point::new(0.3, 0.6)).unwrap();
        }
        tree.insert(Point::new(0.3, 0.61)).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.find_in_radius(Point::new(0.3, 0.6), 0.0).len(), 3);
    }

    #[test]
    fn negative_radius_is_empty() {
        let mut tree = Quadtree::new();
        tree.insert(Point::new(0.5, 0.5)).unwrap();
        assert!(tree.find_in_radius(Point::new(0.5, 0.5), -1.0).is_empty());
        assert!(tree.find_in_radius(Point::new(0.5, 0.5), f64::NAN).is_empty());
    }

    #[test]
    fn rejects_non_finite_input() {
        let mut tree = Quadtree::new();
        assert!(matches!(
            tree.insert(Point::new(f64::INFINITY, 0.0)),
            Err(IndexError::NonFinitePosition { .. })
        ));
        assert!(tree.is_empty());
        assert!(Quadtree::<Point>::with_bounds(Bounds::new(1.0, 1.0, 0.0, 1.0)).is_err());
        assert!(Quadtree::<Point>::with_bounds(Bounds::new(0.0, f64::NAN, 0.0, 1.0)).is_err());
    }

    #[test]
    fn first_item_stays_in_root() {
        let mut tree = Quadtree::new();
        tree.insert(Point::new(0.9, 0.1)).unwrap();
        assert_eq!(tree.depth(), 1);
        tree.insert(Point::new(0.1, 0.9)).unwrap();
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn matches_brute_force_regardless_of_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<Point> = (0..500)
            .map(|_| Point::new(rng.gen_range(-50.0..150.0), rng.gen_range(-20.0..80.0)))
            .collect();

        let mut forward = Quadtree::with_bounds(Bounds::new(0.0, 10.0, 0.0, 10.0)).unwrap();
        let mut backward = Quadtree::with_bounds(Bounds::new(0.0, 10.0, 0.0, 10.0)).unwrap();
        for p in &points {
            forward.insert(*p).unwrap();
        }
        for p in points.iter().rev() {
            backward.insert(*p).unwrap();
        }
        forward.validate().unwrap();
        backward.validate().unwrap();

        for _ in 0..50 {
            let center = Point::new(rng.gen_range(-60.0..160.0), rng.gen_range(-30.0..90.0));
            let radius = rng.gen_range(0.0..40.0);
            let expected: Vec<&Point> = points
                .iter()
                .filter(|p| p.distance_squared(&center) <= radius * radius)
                .collect();
            let expected = sorted(expected);
            assert_eq!(sorted(forward.find_in_radius(center, radius)), expected);
            assert_eq!(sorted(backward.find_in_radius(center, radius)), expected);
        }
    }
}
