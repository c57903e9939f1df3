use super::traits::Containment;

use cgmath::prelude::*;
use cgmath::{BaseFloat, Point2};
use num_traits::Float;

#[cfg(feature="serde")]
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box
///
/// Every node of the hierarchy caches one of these; a branch's bounds are always the union of its
/// children's bounds.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature="serde", derive(Deserialize, Serialize))]
pub struct Bounds<Point> {
    pub min: Point,
    pub max: Point
}

/// The bounds type used throughout the index
pub type Aabb = Bounds<Point2<f32>>;

impl<Point> Bounds<Point>
where
    Point: EuclideanSpace + Copy
{
    pub fn new(min: Point, max: Point) -> Self {
        Self{min, max}
    }

    pub fn size(self) -> Point::Diff {
        self.max - self.min
    }
}

impl<T> Bounds<Point2<T>>
where
    T: BaseFloat
{
    pub fn from_extents(min_x: T, min_y: T, max_x: T, max_y: T) -> Self {
        Self{
            min: Point2::new(min_x, min_y),
            max: Point2::new(max_x, max_y)
        }
    }

    /// The smallest bounds enclosing both `self` and `other`
    pub fn union(self, other: Self) -> Self {
        Self{
            min: Point2::new(
                Float::min(self.min.x, other.min.x),
                Float::min(self.min.y, other.min.y)),
            max: Point2::new(
                Float::max(self.max.x, other.max.x),
                Float::max(self.max.y, other.max.y))
        }
    }

    pub fn area(self) -> T {
        let size = self.size();
        size.x * size.y
    }

    /// Grow (or, for negative `padding`, shrink) every side by `padding`
    pub fn padded(self, padding: T) -> Self {
        Self{
            min: self.min.map(|scalar| scalar - padding),
            max: self.max.map(|scalar| scalar + padding)
        }
    }

    /// Closed-interval overlap; bounds which merely touch are considered overlapping
    pub fn overlaps(self, other: Self) -> bool {
        self.max.x >= other.min.x &&
        self.max.y >= other.min.y &&
        self.min.x <= other.max.x &&
        self.min.y <= other.max.y
    }

    /// Open-interval overlap; bounds which merely touch are not considered overlapping
    pub fn overlaps_strict(self, other: Self) -> bool {
        self.max.x > other.min.x &&
        self.max.y > other.min.y &&
        self.min.x < other.max.x &&
        self.min.y < other.max.y
    }
}

impl<T> Containment for Bounds<Point2<T>>
where
    T: cgmath::BaseNum
{
    fn contains(self, other: Bounds<Point2<T>>) -> bool {
        self.min.x <= other.min.x &&
        self.min.y <= other.min.y &&
        self.max.x >= other.max.x &&
        self.max.y >= other.max.y
    }
}
