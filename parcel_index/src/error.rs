use thiserror::Error;

/// Errors raised by index construction, insertion and validation.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    /// B+Tree order too small to split into two non-empty halves.
    #[error("B+Tree order must be at least {min}, got {order}")]
    InvalidOrder {
        /// Requested order.
        order: usize,
        /// Smallest supported order.
        min: usize,
    },
    /// Quadtree bounds are empty, inverted or non-finite.
    #[error("invalid quadtree bounds [{left}, {right}) x [{top}, {bottom})")]
    InvalidBounds {
        /// Left edge.
        left: f64,
        /// Right edge.
        right: f64,
        /// Top edge.
        top: f64,
        /// Bottom edge.
        bottom: f64,
    },
    /// Position with a NaN or infinite coordinate.
    #[error("position ({x}, {y}) is not finite")]
    NonFinitePosition {
        /// Horizontal coordinate.
        x: f64,
        /// Vertical coordinate.
        y: f64,
    },
    /// A structural invariant does not hold.
    #[error("invariant violated: {0}")]
    Invariant(String),
}
