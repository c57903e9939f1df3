use super::geom::Aabb;
use super::traits::Shape;

use cgmath::prelude::*;
use cgmath::{Basis2, Point2, Rad, Vector2};
use smallvec::SmallVec;

#[cfg(feature="serde")]
use serde::{Deserialize, Serialize};

/// A circle of `radius * scale` centered at `(x, y)`
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature="serde", derive(Deserialize, Serialize))]
pub struct Circle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub scale: f32
}

impl Circle {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self{x, y, radius, scale: 1f32}
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

impl Shape for Circle {
    fn extents(&self) -> Aabb {
        let radius = self.radius * self.scale;
        Aabb::from_extents(
            self.x - radius,
            self.y - radius,
            self.x + radius,
            self.y + radius)
    }
}

/// The pose a set of world coordinates was computed from
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature="serde", derive(Deserialize, Serialize))]
struct Pose {
    x: f32,
    y: f32,
    angle: f32,
    scale_x: f32,
    scale_y: f32
}

/// A polygon given by points in local space
///
/// World-space coordinates are cached and only recomputed when the pose changes or the points are
/// replaced.
#[derive(Clone, Debug)]
#[cfg_attr(feature="serde", derive(Deserialize, Serialize))]
pub struct Polygon {
    pub x: f32,
    pub y: f32,
    /// rotation, in radians
    pub angle: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    points: SmallVec<[Point2<f32>; 8]>,
    coords: SmallVec<[Point2<f32>; 8]>,
    extents: Aabb,
    cached: Option<Pose>
}

impl Polygon {
    pub fn new<I>(x: f32, y: f32, points: I) -> Self
    where
        I: IntoIterator<Item = Point2<f32>>
    {
        Self{
            x,
            y,
            angle: 0f32,
            scale_x: 1f32,
            scale_y: 1f32,
            points: points.into_iter().collect(),
            coords: SmallVec::new(),
            extents: Aabb::from_extents(x, y, x, y),
            cached: None
        }
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_scale(mut self, scale_x: f32, scale_y: f32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Local-space points
    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    /// Replace the local-space points; world coordinates become stale
    pub fn set_points<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = Point2<f32>>
    {
        self.points = points.into_iter().collect();
        self.cached = None;
    }

    /// World-space points as of the last refresh
    pub fn coords(&self) -> &[Point2<f32>] {
        &self.coords
    }

    fn pose(&self) -> Pose {
        Pose{
            x: self.x,
            y: self.y,
            angle: self.angle,
            scale_x: self.scale_x,
            scale_y: self.scale_y
        }
    }
}

impl Shape for Polygon {
    fn needs_refresh(&self) -> bool {
        self.cached != Some(self.pose())
    }

    fn refresh(&mut self) {
        let pose = self.pose();
        let rotation: Basis2<f32> = Rotation2::from_angle(Rad(pose.angle));
        let origin = Vector2::new(pose.x, pose.y);

        self.coords.clear();
        self.coords.extend(self.points.iter().map(|point| {
            let scaled = Vector2::new(point.x * pose.scale_x, point.y * pose.scale_y);
            let rotated = if pose.angle != 0f32 {
                rotation.rotate_vector(scaled)
            } else {
                scaled
            };
            Point2::from_vec(rotated + origin)
        }));

        let mut coords = self.coords.iter();
        self.extents = match coords.next() {
            Some(&first) => coords.fold(
                Aabb::new(first, first),
                |extents, &coord| extents.union(Aabb::new(coord, coord))),
            None => Aabb::from_extents(pose.x, pose.y, pose.x, pose.y)
        };
        self.cached = Some(pose);
    }

    fn extents(&self) -> Aabb {
        self.extents
    }
}

/// Any of the supported shapes, for stores holding a mix of circles and polygons
#[derive(Clone, Debug)]
#[cfg_attr(feature="serde", derive(Deserialize, Serialize))]
pub enum Collider {
    Circle(Circle),
    Polygon(Polygon)
}

impl From<Circle> for Collider {
    fn from(circle: Circle) -> Self {
        Collider::Circle(circle)
    }
}

impl From<Polygon> for Collider {
    fn from(polygon: Polygon) -> Self {
        Collider::Polygon(polygon)
    }
}

impl Collider {
    pub fn position(&self) -> Point2<f32> {
        match self {
            Collider::Circle(circle) => Point2::new(circle.x, circle.y),
            Collider::Polygon(polygon) => Point2::new(polygon.x, polygon.y)
        }
    }

    pub fn set_position(&mut self, position: Point2<f32>) {
        match self {
            Collider::Circle(circle) => {
                circle.x = position.x;
                circle.y = position.y;
            }
            Collider::Polygon(polygon) => {
                polygon.x = position.x;
                polygon.y = position.y;
            }
        }
    }
}

impl Shape for Collider {
    fn needs_refresh(&self) -> bool {
        match self {
            Collider::Circle(circle) => circle.needs_refresh(),
            Collider::Polygon(polygon) => polygon.needs_refresh()
        }
    }

    fn refresh(&mut self) {
        match self {
            Collider::Circle(circle) => circle.refresh(),
            Collider::Polygon(polygon) => polygon.refresh()
        }
    }

    fn extents(&self) -> Aabb {
        match self {
            Collider::Circle(circle) => circle.extents(),
            Collider::Polygon(polygon) => polygon.extents()
        }
    }
}
