use super::bvh::BvhId;
use super::error::Error;
use super::geom::Aabb;
use super::pool::BranchIndex;
use super::traits::Shape;

use std::ops::{Index, IndexMut};

#[cfg(feature="serde")]
use serde::{Deserialize, Serialize};

/// Identifies a body within a [`Bodies`] store
///
/// [`Bodies`]: struct.Bodies.html
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature="serde", derive(Deserialize, Serialize))]
pub struct BodyId(u32);

impl BodyId {
    pub fn index(self) -> usize {
        let Self(index) = self;
        index as usize
    }
}

/// Fields written by the index which owns a body
#[derive(Clone, Debug, Default)]
pub(crate) struct Proxy {
    pub(crate) bounds: Option<Aabb>,
    pub(crate) padding: f32,
    pub(crate) owner: Option<BvhId>,
    pub(crate) parent: Option<BranchIndex>
}

/// A shape plus the padding margin used when it is placed in an index
#[derive(Clone, Debug)]
pub struct Body<S> {
    pub shape: S,
    /// Margin added to every side of the shape's bounds, absorbing small movements
    pub padding: f32,
    pub(crate) proxy: Proxy
}

impl<S> Body<S>
where
    S: Shape
{
    pub fn new(shape: S) -> Self {
        Self::with_padding(shape, 0f32)
    }

    pub fn with_padding(shape: S, padding: f32) -> Self {
        Self{
            shape,
            padding,
            proxy: Proxy{
                padding,
                ..Proxy::default()
            }
        }
    }

    /// Recompute and cache padded bounds using the padding last recorded by the index
    pub(crate) fn recompute_bounds(&mut self) -> Aabb {
        let bounds = self.shape.current_extents().padded(self.proxy.padding);
        self.proxy.bounds = Some(bounds);
        bounds
    }
}

impl<S> Body<S> {
    /// The padded bounds cached by the owning index, if the body has ever been inserted
    pub fn cached_bounds(&self) -> Option<Aabb> {
        self.proxy.bounds
    }

    /// The index this body is a member of
    pub fn owner(&self) -> Option<BvhId> {
        self.proxy.owner
    }

    /// The branch this body hangs from; `None` when unowned or when it is the sole member
    pub fn parent(&self) -> Option<BranchIndex> {
        self.proxy.parent
    }

    pub(crate) fn bounds(&self) -> Aabb {
        self.proxy.bounds.expect("body has no cached bounds; it was never inserted")
    }
}

/// A slab of bodies, addressed by [`BodyId`]
///
/// Several indices may share one store; each body is a member of at most one of them.
///
/// [`BodyId`]: struct.BodyId.html
#[derive(Clone, Debug)]
pub struct Bodies<S> {
    slots: Vec<Option<Body<S>>>,
    free: Vec<u32>,
    len: usize
}

impl<S> Default for Bodies<S> {
    fn default() -> Self {
        Self{
            slots: Vec::new(),
            free: Vec::new(),
            len: 0
        }
    }
}

impl<S> Bodies<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self{
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Add a body, reusing the slot of a removed body if one is available
    pub fn add(&mut self, body: Body<S>) -> BodyId {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(body);
                BodyId(index)
            }
            None => {
                self.slots.push(Some(body));
                BodyId((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Take a body out of the store
    ///
    /// Fails if the body is still a member of an index; remove it from that index first.
    pub fn remove(&mut self, id: BodyId) -> Result<Option<Body<S>>, Error> {
        let owner = match self.get(id) {
            Some(body) => body.owner(),
            None => return Ok(None)
        };
        if owner.is_some() {
            warn!("refusing to drop {:?} while it is a member of {:?}", id, owner);
            return Err(Error::Ownership{body: id, owner});
        }
        self.len -= 1;
        self.free.push(id.0);
        Ok(self.slots[id.index()].take())
    }

    pub fn get(&self, id: BodyId) -> Option<&Body<S>> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Body<S>> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &Body<S>)> {
        self.slots.iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|body| (BodyId(index as u32), body)))
    }
}

impl<S> Index<BodyId> for Bodies<S> {
    type Output = Body<S>;

    fn index(&self, id: BodyId) -> &Body<S> {
        self.slots[id.index()].as_ref().expect("no body stored under this id")
    }
}

impl<S> IndexMut<BodyId> for Bodies<S> {
    fn index_mut(&mut self, id: BodyId) -> &mut Body<S> {
        self.slots[id.index()].as_mut().expect("no body stored under this id")
    }
}
