use super::body::BodyId;
use super::geom::Aabb;

use std::ops::{Index, IndexMut};

/// Identifies a branch within the pool of the index which created it
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BranchIndex(u32);

impl BranchIndex {
    pub fn index(self) -> usize {
        let Self(index) = self;
        index as usize
    }
}

/// A child slot in the hierarchy: either another branch or a body
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NodeRef {
    Branch(BranchIndex),
    Leaf(BodyId)
}

/// An internal node, bounding exactly two children
#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    pub(crate) bounds: Aabb,
    pub(crate) parent: Option<BranchIndex>,
    pub(crate) left: NodeRef,
    pub(crate) right: NodeRef,
    pub(crate) sort: u32
}

impl Branch {
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn parent(&self) -> Option<BranchIndex> {
        self.parent
    }

    pub fn left(&self) -> NodeRef {
        self.left
    }

    pub fn right(&self) -> NodeRef {
        self.right
    }

    /// Traversal-order tag assigned by the most recent insertion passing through this branch
    pub fn sort(&self) -> u32 {
        self.sort
    }

    /// Point whichever child slot currently holds `old` at `new`
    pub(crate) fn replace_child(&mut self, old: NodeRef, new: NodeRef) {
        if self.left == old {
            self.left = new;
        } else {
            self.right = new;
        }
    }
}

/// Storage for the branches of one index
///
/// Released slots are kept on a free list and handed out again before the arena grows.
#[derive(Clone, Debug, Default)]
pub struct BranchPool {
    branches: Vec<Branch>,
    free: Vec<BranchIndex>
}

impl BranchPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self{
            branches: Vec::with_capacity(capacity),
            free: Vec::new()
        }
    }

    /// Number of live branches
    pub fn len(&self) -> usize {
        self.branches.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `branch`, overwriting a released slot when one is available
    pub fn get_branch(&mut self, branch: Branch) -> BranchIndex {
        match self.free.pop() {
            Some(index) => {
                self.branches[index.index()] = branch;
                index
            }
            None => {
                self.branches.push(branch);
                trace!("branch pool grew to {} slots", self.branches.len());
                BranchIndex((self.branches.len() - 1) as u32)
            }
        }
    }

    /// Return a branch to the pool; its contents are garbage until handed out again
    pub fn release_branch(&mut self, index: BranchIndex) {
        debug_assert!(!self.free.contains(&index), "branch {:?} released twice", index);
        self.free.push(index);
    }

    /// Release every branch at once
    pub fn clear(&mut self) {
        self.branches.clear();
        self.free.clear();
    }
}

impl Index<BranchIndex> for BranchPool {
    type Output = Branch;

    fn index(&self, index: BranchIndex) -> &Branch {
        &self.branches[index.index()]
    }
}

impl IndexMut<BranchIndex> for BranchPool {
    fn index_mut(&mut self, index: BranchIndex) -> &mut Branch {
        &mut self.branches[index.index()]
    }
}
