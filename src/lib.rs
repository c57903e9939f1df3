// mlodato, 20190219

//! [`Bvh`]: struct.Bvh.html
//! [`Bodies`]: struct.Bodies.html
//! [`Shape`]: trait.Shape.html
//! A 2D broadphase built on a dynamic bounding volume hierarchy
//!
//! Bodies live in a [`Bodies`] store and are placed into a [`Bvh`], which keeps a binary tree of
//! padded axis-aligned bounds.  Once per simulation step, call `update` to relocate bodies that
//! escaped their cached bounds, then use `potentials` (or `potential_pairs`) to find candidates
//! for exact collision tests.  Shapes are opaque to the index apart from the [`Shape`] trait.
//!
//! ```
//! use broadphase_bvh::{Bodies, Body, Bvh, Circle};
//!
//! let mut bodies = Bodies::new();
//! let a = bodies.add(Body::new(Circle::new(0.0, 0.0, 1.0)));
//! let b = bodies.add(Body::new(Circle::new(5.0, 5.0, 1.0)));
//! let c = bodies.add(Body::new(Circle::new(0.5, 0.5, 1.0)));
//!
//! let mut bvh = Bvh::new();
//! for &id in &[a, b, c] {
//!     bvh.insert(&mut bodies, id).unwrap();
//! }
//!
//! assert_eq!(bvh.potentials(&bodies, a), vec![c]);
//! assert!(bvh.potentials(&bodies, b).is_empty());
//! ```

extern crate cgmath;
extern crate num_traits;
extern crate rustc_hash;
extern crate smallvec;

#[cfg(feature="parallel")]
extern crate rayon;

#[cfg(feature="serde")]
extern crate serde;

#[macro_use]
extern crate log;

mod body;
mod bvh;
mod error;
mod geom;
mod pool;
mod shapes;
mod traits;

pub use body::{Bodies, Body, BodyId};
pub use bvh::{Bvh, BvhBuilder, BvhId};
pub use error::Error;
pub use geom::{Aabb, Bounds};
pub use pool::{Branch, BranchIndex, BranchPool, NodeRef};
pub use shapes::{Circle, Collider, Polygon};
pub use traits::{Containment, Shape};
