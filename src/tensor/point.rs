//! Lightweight 2D point value type.

use crate::util::math::sqr;
use num_traits::NumCast;
use std::ops::{Add, Mul, Sub};

/// 2D point with `x` as the column and `y` as the row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point2<T> {
    pub x: T,
    pub y: T,
}

impl<T> Point2<T> {
    /// Creates a point from column and row coordinates.
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Copy + Mul<Output = T> + Add<Output = T>> Point2<T> {
    /// Squared Euclidean length.
    pub fn l2(&self) -> T {
        sqr(self.x) + sqr(self.y)
    }
}

impl<T: NumCast + Copy> Point2<T> {
    /// Converts both coordinates to another numeric type.
    ///
    /// Returns `None` if either coordinate is not representable in `S`.
    pub fn cast<S: NumCast>(&self) -> Option<Point2<S>> {
        Some(Point2 {
            x: num_traits::cast(self.x)?,
            y: num_traits::cast(self.y)?,
        })
    }
}

impl<T: Sub<Output = T>> Sub for Point2<T> {
    type Output = Point2<T>;

    fn sub(self, rhs: Self) -> Self::Output {
        Point2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}
