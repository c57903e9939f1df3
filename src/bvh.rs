use super::body::{Bodies, BodyId};
use super::error::Error;
use super::geom::Aabb;
use super::pool::{Branch, BranchIndex, BranchPool, NodeRef};
use super::traits::{Containment, Shape};

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature="parallel")]
use rayon::prelude::*;

static NEXT_BVH_ID: AtomicU32 = AtomicU32::new(0);

/// Distinguishes one index from another, for ownership checks
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BvhId(u32);

/// [`Bodies`]: struct.Bodies.html
/// [`Shape`]: trait.Shape.html
/// A dynamic bounding volume hierarchy over bodies held in a [`Bodies`] store
///
/// Leaves are bodies and internal nodes are branches, each bounding exactly two children.  Bodies
/// are placed greedily (descending toward whichever child grows least) and relocated by `update`
/// only once they escape their cached, padded bounds.
///
/// The index never owns body geometry; every operation borrows the store the bodies live in, and
/// reads shapes only through the [`Shape`] trait.
#[derive(Debug)]
pub struct Bvh {
    id: BvhId,
    root: Option<NodeRef>,
    members: Vec<BodyId>,
    pool: BranchPool
}

impl Default for Bvh {
    fn default() -> Self {
        BvhBuilder::new().build()
    }
}

impl Bvh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> BvhId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member bodies, in insertion order
    pub fn members(&self) -> &[BodyId] {
        &self.members
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.members.contains(&id)
    }

    /// The root node: `None` when empty, a leaf when there is exactly one member
    pub fn root(&self) -> Option<NodeRef> {
        self.root
    }

    /// Inspect a live branch
    ///
    /// This is primarily intended for visualization + debugging
    pub fn branch(&self, index: BranchIndex) -> &Branch {
        &self.pool[index]
    }

    pub fn branch_count(&self) -> usize {
        self.pool.len()
    }

    /// Number of nodes on the longest path from the root to a leaf
    pub fn depth(&self) -> usize {
        let mut stack: SmallVec<[(NodeRef, usize); 32]> = SmallVec::new();
        let mut depth = 0;
        if let Some(root) = self.root {
            stack.push((root, 1));
        }
        while let Some((node, level)) = stack.pop() {
            depth = std::cmp::max(depth, level);
            if let NodeRef::Branch(index) = node {
                let branch = &self.pool[index];
                stack.push((branch.left, level + 1));
                stack.push((branch.right, level + 1));
            }
        }
        depth
    }

    /// Add a body to the index
    ///
    /// Fails without modifying anything if the body is already a member of any index (this one
    /// included).
    pub fn insert<S>(&mut self, bodies: &mut Bodies<S>, id: BodyId) -> Result<(), Error>
    where
        S: Shape
    {
        let body = &mut bodies[id];
        if let Some(owner) = body.proxy.owner {
            debug!("{:?} rejected {:?}, already owned by {:?}", self.id, id, owner);
            return Err(Error::Ownership{body: id, owner: Some(owner)});
        }

        body.proxy.owner = Some(self.id);
        body.proxy.padding = body.padding;
        self.members.push(id);
        self.insert_leaf(bodies, id);

        trace!("{:?} inserted {:?}", self.id, id);
        Ok(())
    }

    /// Take a body out of the index
    ///
    /// Fails without modifying anything unless the body is a member of this index.
    pub fn remove<S>(&mut self, bodies: &mut Bodies<S>, id: BodyId) -> Result<(), Error>
    where
        S: Shape
    {
        self.check_owner(bodies, id)?;

        self.remove_leaf(bodies, id);
        bodies[id].proxy.owner = None;
        if let Some(position) = self.members.iter().position(|&member| member == id) {
            self.members.remove(position);
        }

        trace!("{:?} removed {:?}", self.id, id);
        Ok(())
    }

    /// Unconditionally move a member to a fresh position, recomputing its cached bounds
    pub fn relocate<S>(&mut self, bodies: &mut Bodies<S>, id: BodyId) -> Result<(), Error>
    where
        S: Shape
    {
        self.check_owner(bodies, id)?;

        let body = &mut bodies[id];
        body.proxy.padding = body.padding;
        self.remove_leaf(bodies, id);
        self.insert_leaf(bodies, id);
        Ok(())
    }

    /// Relocate every member whose padding changed or whose shape escaped its cached bounds
    ///
    /// Bodies which moved or shrank while staying inside their cached bounds are left in place.
    /// Returns the number of relocated bodies.
    pub fn update<S>(&mut self, bodies: &mut Bodies<S>) -> usize
    where
        S: Shape
    {
        let mut relocated = 0;

        for i in 0..self.members.len() {
            let id = self.members[i];
            let body = &mut bodies[id];

            let mut relocate = false;
            if body.padding != body.proxy.padding {
                body.proxy.padding = body.padding;
                relocate = true;
            }
            if !relocate {
                let extents = body.shape.current_extents();
                relocate = !body.bounds().contains(extents);
            }

            if relocate {
                trace!("{:?} relocating {:?}", self.id, id);
                self.remove_leaf(bodies, id);
                self.insert_leaf(bodies, id);
                relocated += 1;
            }
        }

        if relocated > 0 {
            debug!("{:?} relocated {} of {} bodies", self.id, relocated, self.members.len());
        }
        relocated
    }

    /// All other members whose cached bounds overlap those of `id`
    pub fn potentials<S>(&self, bodies: &Bodies<S>, id: BodyId) -> Vec<BodyId> {
        let mut results = Vec::new();
        self.potentials_filtered(bodies, id, |_, _| true, &mut results);
        results
    }

    /// Appends to `results` all other members whose cached bounds overlap those of `id`, and which
    /// pass a user-specified test
    ///
    /// `filter` is called as `filter(id, candidate)`.  Results are appended in traversal order;
    /// `results` is not cleared, so one buffer may be reused across many queries.
    ///
    /// Descending into a left child accepts bounds which merely touch the query, while stepping
    /// into a right child requires them to strictly overlap, so edge-adjacent pairs may or may not
    /// be reported depending on the shape of the tree.
    pub fn potentials_filtered<S, F>(
        &self,
        bodies: &Bodies<S>,
        id: BodyId,
        mut filter: F,
        results: &mut Vec<BodyId>)
    where
        F: FnMut(BodyId, BodyId) -> bool
    {
        let query = match bodies[id].cached_bounds() {
            Some(bounds) => bounds,
            None => {
                debug!("{:?} has never been inserted; no potentials", id);
                return;
            }
        };

        self.traverse(bodies, query, |candidate| {
            if candidate != id && filter(id, candidate) {
                results.push(candidate);
            }
        });
    }

    /// Appends to `results` every member whose cached bounds overlap `bounds`
    pub fn query_bounds<S>(&self, bodies: &Bodies<S>, bounds: Aabb, results: &mut Vec<BodyId>) {
        self.traverse(bodies, bounds, |candidate| results.push(candidate));
    }

    /// Every pair of members with overlapping cached bounds which passes `filter`
    ///
    /// Pairs are ordered `(lo, hi)`, sorted and free of duplicates.
    pub fn potential_pairs<S, F>(&self, bodies: &Bodies<S>, mut filter: F) -> Vec<(BodyId, BodyId)>
    where
        F: FnMut(BodyId, BodyId) -> bool
    {
        let mut scratch = Vec::new();
        let mut pairs = Vec::new();
        for &id in &self.members {
            self.collect_pairs(bodies, id, &mut filter, &mut scratch, &mut pairs);
        }
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    /// [`potential_pairs`]: struct.Bvh.html#method.potential_pairs
    /// Parallel version of [`potential_pairs`]
    #[cfg(feature="parallel")]
    pub fn par_potential_pairs<S, F>(&self, bodies: &Bodies<S>, filter: F) -> Vec<(BodyId, BodyId)>
    where
        S: Sync,
        F: Fn(BodyId, BodyId) -> bool + Sync
    {
        let mut pairs = self.members.par_iter()
            .fold(|| (Vec::new(), Vec::new()), |(mut scratch, mut pairs), &id| {
                let mut filter_ = |lhs: BodyId, rhs: BodyId| filter(lhs, rhs);
                self.collect_pairs(bodies, id, &mut filter_, &mut scratch, &mut pairs);
                (scratch, pairs)
            })
            .map(|(_, pairs)| pairs)
            .reduce(Vec::new, |mut lhs, mut rhs| {
                lhs.append(&mut rhs);
                lhs
            });
        pairs.par_sort_unstable();
        pairs.dedup();
        pairs
    }

    /// Drop every member, leaving the bodies unowned
    pub fn clear<S>(&mut self, bodies: &mut Bodies<S>) {
        for &id in &self.members {
            let proxy = &mut bodies[id].proxy;
            proxy.owner = None;
            proxy.parent = None;
        }
        self.members.clear();
        self.pool.clear();
        self.root = None;
    }

    /// Check the structural invariants of the hierarchy, logging every violation found
    ///
    /// Branch bounds must equal the union of their children, parent links must mirror child links,
    /// every branch must have two children, and the leaves must be exactly the members.
    pub fn validate<S>(&self, bodies: &Bodies<S>) -> bool {
        let mut valid = true;
        let mut leaves: FxHashSet<BodyId> = FxHashSet::default();
        let mut branches = 0usize;

        let mut stack: SmallVec<[(NodeRef, Option<BranchIndex>); 32]> = SmallVec::new();
        if let Some(root) = self.root {
            stack.push((root, None));
        }

        while let Some((node, expected_parent)) = stack.pop() {
            let parent = self.parent_of(bodies, node);
            if parent != expected_parent {
                warn!("{:?}: {:?} links to parent {:?}, expected {:?}", self.id, node, parent, expected_parent);
                valid = false;
            }

            match node {
                NodeRef::Branch(index) => {
                    branches += 1;
                    let branch = &self.pool[index];
                    let union = self.node_bounds(bodies, branch.left)
                        .union(self.node_bounds(bodies, branch.right));
                    if union != branch.bounds {
                        warn!("{:?}: {:?} bounds {:?} differ from union of children {:?}",
                            self.id, index, branch.bounds, union);
                        valid = false;
                    }
                    if branch.left == branch.right {
                        warn!("{:?}: {:?} has the same node as both children", self.id, index);
                        valid = false;
                    }
                    stack.push((branch.right, Some(index)));
                    stack.push((branch.left, Some(index)));
                }
                NodeRef::Leaf(id) => {
                    let body = &bodies[id];
                    if body.owner() != Some(self.id) {
                        warn!("{:?}: leaf {:?} is owned by {:?}", self.id, id, body.owner());
                        valid = false;
                    }
                    if !leaves.insert(id) {
                        warn!("{:?}: {:?} appears more than once", self.id, id);
                        valid = false;
                    }
                }
            }
        }

        if !leaves.is_empty() && branches + 1 != leaves.len() {
            warn!("{:?}: {} branches for {} leaves", self.id, branches, leaves.len());
            valid = false;
        }
        if branches != self.pool.len() {
            warn!("{:?}: {} reachable branches but {} live in the pool", self.id, branches, self.pool.len());
            valid = false;
        }

        let members: FxHashSet<BodyId> = self.members.iter().cloned().collect();
        if members.len() != self.members.len() {
            warn!("{:?}: duplicate members", self.id);
            valid = false;
        }
        if members != leaves {
            warn!("{:?}: leaves {:?} do not match members {:?}", self.id, leaves, members);
            valid = false;
        }

        valid
    }

    fn check_owner<S>(&self, bodies: &Bodies<S>, id: BodyId) -> Result<(), Error> {
        let owner = bodies[id].owner();
        if owner != Some(self.id) {
            debug!("{:?} rejected {:?}, owned by {:?}", self.id, id, owner);
            return Err(Error::Ownership{body: id, owner});
        }
        Ok(())
    }

    fn node_bounds<S>(&self, bodies: &Bodies<S>, node: NodeRef) -> Aabb {
        match node {
            NodeRef::Branch(index) => self.pool[index].bounds,
            NodeRef::Leaf(id) => bodies[id].bounds()
        }
    }

    fn parent_of<S>(&self, bodies: &Bodies<S>, node: NodeRef) -> Option<BranchIndex> {
        match node {
            NodeRef::Branch(index) => self.pool[index].parent,
            NodeRef::Leaf(id) => bodies[id].parent()
        }
    }

    fn set_parent<S>(&mut self, bodies: &mut Bodies<S>, node: NodeRef, parent: Option<BranchIndex>) {
        match node {
            NodeRef::Branch(index) => self.pool[index].parent = parent,
            NodeRef::Leaf(id) => bodies[id].proxy.parent = parent
        }
    }

    fn children(&self, node: NodeRef) -> Option<(NodeRef, NodeRef)> {
        match node {
            NodeRef::Branch(index) => {
                let branch = &self.pool[index];
                Some((branch.left, branch.right))
            }
            NodeRef::Leaf(_) => None
        }
    }

    /// Link a member's leaf into the tree, leaving membership bookkeeping untouched
    fn insert_leaf<S>(&mut self, bodies: &mut Bodies<S>, id: BodyId)
    where
        S: Shape
    {
        let bounds = bodies[id].recompute_bounds();

        let mut current = match self.root {
            Some(root) => root,
            None => {
                bodies[id].proxy.parent = None;
                self.root = Some(NodeRef::Leaf(id));
                return;
            }
        };

        let mut sort = 0u32;
        loop {
            match current {
                NodeRef::Branch(index) => {
                    let (left, right) = (self.pool[index].left, self.pool[index].right);

                    let left_bounds = self.node_bounds(bodies, left);
                    let left_grown = left_bounds.union(bounds);
                    let left_difference = left_grown.area() - left_bounds.area();

                    let right_bounds = self.node_bounds(bodies, right);
                    let right_grown = right_bounds.union(bounds);
                    let right_difference = right_grown.area() - right_bounds.area();

                    let branch = &mut self.pool[index];
                    branch.sort = sort;
                    branch.bounds = left_grown.union(right_grown);
                    sort += 1;

                    current = if left_difference <= right_difference { left } else { right };
                }
                NodeRef::Leaf(sibling) => {
                    let grandparent = bodies[sibling].parent();
                    let new_parent = self.pool.get_branch(Branch{
                        bounds: bodies[sibling].bounds().union(bounds),
                        parent: grandparent,
                        left: current,
                        right: NodeRef::Leaf(id),
                        sort
                    });

                    bodies[sibling].proxy.parent = Some(new_parent);
                    bodies[id].proxy.parent = Some(new_parent);

                    match grandparent {
                        Some(grandparent) =>
                            self.pool[grandparent].replace_child(current, NodeRef::Branch(new_parent)),
                        None =>
                            self.root = Some(NodeRef::Branch(new_parent))
                    }
                    break;
                }
            }
        }
    }

    /// Unlink a member's leaf from the tree, leaving membership bookkeeping untouched
    ///
    /// Panics if the body is not linked into this tree.
    fn remove_leaf<S>(&mut self, bodies: &mut Bodies<S>, id: BodyId) {
        let leaf = NodeRef::Leaf(id);
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let parent = bodies[id].proxy.parent.take()
            .expect("body is not linked into the hierarchy");
        let (grandparent, left, right, sort) = {
            let branch = &self.pool[parent];
            (branch.parent, branch.left, branch.right, branch.sort)
        };
        let sibling = if left == leaf { right } else { left };

        self.set_parent(bodies, sibling, grandparent);
        if let NodeRef::Branch(index) = sibling {
            self.pool[index].sort = sort;
        }

        match grandparent {
            Some(grandparent) => {
                self.pool[grandparent].replace_child(NodeRef::Branch(parent), sibling);
                self.refit(bodies, grandparent);
            }
            None => self.root = Some(sibling)
        }

        self.pool.release_branch(parent);
    }

    /// Recompute bounds from `start` up to the root
    fn refit<S>(&mut self, bodies: &Bodies<S>, start: BranchIndex) {
        let mut next = Some(start);
        while let Some(index) = next {
            let (left, right) = (self.pool[index].left, self.pool[index].right);
            let bounds = self.node_bounds(bodies, left).union(self.node_bounds(bodies, right));
            let branch = &mut self.pool[index];
            branch.bounds = bounds;
            next = branch.parent;
        }
    }

    /// Visit every leaf whose bounds overlap `query`, walking parent links instead of keeping a
    /// stack
    ///
    /// From the current node, descend left for as long as the left child overlaps; then step into
    /// the right child if it overlaps and start descending left again.  When the right side is a
    /// dead end, report the current node if it is a leaf and climb past every ancestor reached from
    /// its right child; the first ancestor reached from its left child has its right side explored
    /// next.  A tree of fewer than two members reports nothing.
    fn traverse<S, V>(&self, bodies: &Bodies<S>, query: Aabb, mut visit: V)
    where
        V: FnMut(BodyId)
    {
        let mut current = match self.root {
            Some(root @ NodeRef::Branch(_)) => root,
            _ => return
        };
        let mut traverse_left = true;

        loop {
            if traverse_left {
                traverse_left = false;
                while let Some((left, _)) = self.children(current) {
                    if !self.node_bounds(bodies, left).overlaps(query) {
                        break;
                    }
                    current = left;
                }
            }

            if let Some((_, right)) = self.children(current) {
                if self.node_bounds(bodies, right).overlaps_strict(query) {
                    current = right;
                    traverse_left = true;
                    continue;
                }
            }

            if let NodeRef::Leaf(id) = current {
                visit(id);
            }

            let mut parent = self.parent_of(bodies, current);
            while let Some(index) = parent {
                let branch = &self.pool[index];
                if branch.right != current {
                    break;
                }
                current = NodeRef::Branch(index);
                parent = branch.parent;
            }

            match parent {
                Some(index) => current = NodeRef::Branch(index),
                None => break
            }
        }
    }

    fn collect_pairs<S, F>(
        &self,
        bodies: &Bodies<S>,
        id: BodyId,
        filter: &mut F,
        scratch: &mut Vec<BodyId>,
        pairs: &mut Vec<(BodyId, BodyId)>)
    where
        F: FnMut(BodyId, BodyId) -> bool
    {
        scratch.clear();
        self.potentials_filtered(bodies, id, |lhs, rhs| filter(lhs, rhs), scratch);
        pairs.extend(scratch.iter().map(|&other| {
            if id < other { (id, other) } else { (other, id) }
        }));
    }
}

/// A builder for `Bvh`s
#[derive(Default)]
pub struct BvhBuilder {
    member_capacity: Option<usize>,
    branch_capacity: Option<usize>
}

impl BvhBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member_capacity(&mut self, capacity: usize) -> &mut Self {
        self.member_capacity = Some(capacity);
        self
    }

    pub fn with_branch_capacity(&mut self, capacity: usize) -> &mut Self {
        self.branch_capacity = Some(capacity);
        self
    }

    pub fn build(&self) -> Bvh {
        Bvh{
            id: BvhId(NEXT_BVH_ID.fetch_add(1, Ordering::Relaxed)),
            root: None,
            members: match self.member_capacity {
                    Some(capacity) => Vec::with_capacity(capacity),
                    None => Vec::new()
                },
            pool: match self.branch_capacity {
                    Some(capacity) => BranchPool::with_capacity(capacity),
                    None => BranchPool::new()
                }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::shapes::Circle;

    fn circles(centers: &[(f32, f32)]) -> (Bodies<Circle>, Vec<BodyId>) {
        let mut bodies = Bodies::new();
        let ids = centers.iter()
            .map(|&(x, y)| bodies.add(Body::new(Circle::new(x, y, 1f32))))
            .collect();
        (bodies, ids)
    }

    fn populated(centers: &[(f32, f32)]) -> (Bodies<Circle>, Vec<BodyId>, Bvh) {
        let (mut bodies, ids) = circles(centers);
        let mut bvh = Bvh::new();
        for &id in &ids {
            bvh.insert(&mut bodies, id).expect("fresh body must be insertable");
        }
        (bodies, ids, bvh)
    }

    #[test]
    fn three_circles() {
        let (bodies, ids, bvh) = populated(&[(0f32, 0f32), (5f32, 5f32), (0.5f32, 0.5f32)]);
        assert!(bvh.validate(&bodies));
        assert_eq!(bvh.potentials(&bodies, ids[0]), vec![ids[2]]);
        assert!(bvh.potentials(&bodies, ids[1]).is_empty());
        assert_eq!(bvh.potentials(&bodies, ids[2]), vec![ids[0]]);
    }

    #[test]
    fn touching_sibling_leaves() {
        let (bodies, ids, bvh) = populated(&[(0f32, 0f32), (2f32, 0f32)]);
        assert_eq!(bvh.root().and_then(|root| match root {
            NodeRef::Branch(index) => Some(bvh.branch(index).right()),
            NodeRef::Leaf(_) => None
        }), Some(NodeRef::Leaf(ids[1])));

        assert!(bvh.potentials(&bodies, ids[0]).is_empty());
        assert_eq!(bvh.potentials(&bodies, ids[1]), vec![ids[0]]);
        assert_eq!(bvh.potential_pairs(&bodies, |_, _| true), vec![(ids[0], ids[1])]);
    }

    #[test]
    fn touching_right_child_of_nested_branch() {
        let (bodies, ids, bvh) = populated(&[(0f32, 0f32), (10f32, 10f32), (2f32, 0f32)]);
        let root = match bvh.root() {
            Some(NodeRef::Branch(index)) => bvh.branch(index),
            other => panic!("expected a branch at the root, found {:?}", other)
        };
        assert_eq!(root.right(), NodeRef::Leaf(ids[1]));
        let split = match root.left() {
            NodeRef::Branch(index) => bvh.branch(index),
            other => panic!("expected a branch on the left, found {:?}", other)
        };
        assert_eq!(split.left(), NodeRef::Leaf(ids[0]));
        assert_eq!(split.right(), NodeRef::Leaf(ids[2]));

        assert!(bvh.potentials(&bodies, ids[0]).is_empty());
        assert!(bvh.potentials(&bodies, ids[1]).is_empty());
        assert_eq!(bvh.potentials(&bodies, ids[2]), vec![ids[0]]);
        assert_eq!(bvh.potential_pairs(&bodies, |_, _| true), vec![(ids[0], ids[2])]);
    }

    #[test]
    fn greedy_placement() {
        let (bodies, ids, bvh) = populated(&[(0f32, 0f32), (5f32, 5f32), (0.5f32, 0.5f32)]);

        let root = match bvh.root() {
            Some(NodeRef::Branch(index)) => bvh.branch(index),
            other => panic!("expected a branch at the root, found {:?}", other)
        };
        assert_eq!(root.right(), NodeRef::Leaf(ids[1]));
        assert_eq!(root.bounds(), Aabb::from_extents(-1f32, -1f32, 6f32, 6f32));
        assert_eq!(root.sort(), 0);

        let split = match root.left() {
            NodeRef::Branch(index) => bvh.branch(index),
            other => panic!("expected the new branch on the left, found {:?}", other)
        };
        assert_eq!(split.left(), NodeRef::Leaf(ids[0]));
        assert_eq!(split.right(), NodeRef::Leaf(ids[2]));
        assert_eq!(split.bounds(), Aabb::from_extents(-1f32, -1f32, 1.5f32, 1.5f32));
        assert_eq!(split.sort(), 1);
        assert_eq!(bodies[ids[2]].parent(), bodies[ids[0]].parent());
        assert_eq!(bvh.depth(), 3);
    }

    #[test]
    fn empty_and_single() {
        let (mut bodies, ids) = circles(&[(0f32, 0f32), (0.5f32, 0f32)]);
        let mut bvh = Bvh::new();
        assert_eq!(bvh.root(), None);
        assert_eq!(bvh.depth(), 0);

        bvh.insert(&mut bodies, ids[0]).expect("fresh body must be insertable");
        assert_eq!(bvh.root(), Some(NodeRef::Leaf(ids[0])));
        assert_eq!(bvh.branch_count(), 0);
        assert_eq!(bodies[ids[0]].parent(), None);
        assert_eq!(bvh.depth(), 1);

        let mut results = vec![ids[1]];
        bvh.potentials_filtered(&bodies, ids[0], |_, _| true, &mut results);
        assert_eq!(results, vec![ids[1]]);
        assert!(bvh.validate(&bodies));
    }

    #[test]
    fn padding_is_applied() {
        let mut bodies = Bodies::new();
        let id = bodies.add(Body::with_padding(Circle::new(1f32, 1f32, 1f32).with_scale(2f32), 0.5f32));
        let mut bvh = Bvh::new();
        bvh.insert(&mut bodies, id).expect("fresh body must be insertable");
        assert_eq!(bodies[id].cached_bounds(), Some(Aabb::from_extents(-1.5f32, -1.5f32, 3.5f32, 3.5f32)));
        assert_eq!(bodies[id].owner(), Some(bvh.id()));
    }

    #[test]
    fn foreign_bodies_are_rejected() {
        let (mut bodies, ids) = circles(&[(0f32, 0f32), (1f32, 0f32)]);
        let mut lhs = Bvh::new();
        let mut rhs = Bvh::new();
        lhs.insert(&mut bodies, ids[0]).expect("fresh body must be insertable");
        lhs.insert(&mut bodies, ids[1]).expect("fresh body must be insertable");

        let root = lhs.root();
        assert_eq!(
            rhs.insert(&mut bodies, ids[0]),
            Err(Error::Ownership{body: ids[0], owner: Some(lhs.id())}));
        assert_eq!(
            rhs.remove(&mut bodies, ids[1]),
            Err(Error::Ownership{body: ids[1], owner: Some(lhs.id())}));
        assert_eq!(
            lhs.insert(&mut bodies, ids[1]),
            Err(Error::Ownership{body: ids[1], owner: Some(lhs.id())}));

        assert_eq!(lhs.root(), root);
        assert_eq!(lhs.len(), 2);
        assert!(lhs.contains(ids[0]));
        assert!(!rhs.contains(ids[0]));
        assert!(rhs.is_empty());
        assert_eq!(rhs.root(), None);
        assert!(lhs.validate(&bodies));
        assert!(rhs.validate(&bodies));
    }

    #[test]
    fn removing_non_member_is_rejected() {
        let (mut bodies, ids) = circles(&[(0f32, 0f32)]);
        let mut bvh = Bvh::new();
        assert_eq!(
            bvh.remove(&mut bodies, ids[0]),
            Err(Error::Ownership{body: ids[0], owner: None}));
        assert_eq!(
            bvh.relocate(&mut bodies, ids[0]),
            Err(Error::Ownership{body: ids[0], owner: None}));
    }

    #[test]
    fn remove_collapses_branches() {
        let (mut bodies, ids, mut bvh) = populated(&[(0f32, 0f32), (5f32, 5f32), (0.5f32, 0.5f32)]);

        bvh.remove(&mut bodies, ids[0]).expect("member must be removable");
        assert!(bvh.validate(&bodies));
        assert_eq!(bvh.members(), &[ids[1], ids[2]]);
        assert_eq!(bvh.branch_count(), 1);
        assert_eq!(bodies[ids[0]].owner(), None);
        assert_eq!(bodies[ids[0]].parent(), None);

        let root = match bvh.root() {
            Some(NodeRef::Branch(index)) => bvh.branch(index),
            other => panic!("expected a branch at the root, found {:?}", other)
        };
        assert_eq!(root.left(), NodeRef::Leaf(ids[2]));
        assert_eq!(root.bounds(), Aabb::from_extents(-0.5f32, -0.5f32, 6f32, 6f32));

        bvh.remove(&mut bodies, ids[1]).expect("member must be removable");
        assert_eq!(bvh.root(), Some(NodeRef::Leaf(ids[2])));
        assert_eq!(bodies[ids[2]].parent(), None);
        assert_eq!(bvh.branch_count(), 0);

        bvh.remove(&mut bodies, ids[2]).expect("member must be removable");
        assert_eq!(bvh.root(), None);
        assert!(bvh.is_empty());
        assert!(bvh.validate(&bodies));
    }

    #[test]
    fn promoted_branch_inherits_sort() {
        let (mut bodies, ids, mut bvh) = populated(&[(0f32, 0f32), (5f32, 5f32), (0.5f32, 0.5f32)]);
        let root = match bvh.root() {
            Some(NodeRef::Branch(index)) => index,
            other => panic!("expected a branch at the root, found {:?}", other)
        };
        let split = match bvh.branch(root).left() {
            NodeRef::Branch(index) => index,
            other => panic!("expected a branch on the left, found {:?}", other)
        };
        assert_eq!(bvh.branch(split).sort(), 1);

        bvh.remove(&mut bodies, ids[1]).expect("member must be removable");
        assert_eq!(bvh.root(), Some(NodeRef::Branch(split)));
        assert_eq!(bvh.branch(split).sort(), 0);
        assert_eq!(bvh.branch(split).parent(), None);
    }

    #[test]
    fn update_without_movement() {
        let (mut bodies, ids, mut bvh) = populated(&[(0f32, 0f32), (5f32, 5f32), (0.5f32, 0.5f32)]);
        let before: Vec<_> = ids.iter().map(|&id| (bodies[id].cached_bounds(), bodies[id].parent())).collect();
        let root = bvh.root();

        assert_eq!(bvh.update(&mut bodies), 0);

        let after: Vec<_> = ids.iter().map(|&id| (bodies[id].cached_bounds(), bodies[id].parent())).collect();
        assert_eq!(before, after);
        assert_eq!(bvh.root(), root);
        assert_eq!(bvh.members(), &ids[..]);
    }

    #[test]
    fn update_ignores_movement_within_padding() {
        let mut bodies = Bodies::new();
        let a = bodies.add(Body::with_padding(Circle::new(0f32, 0f32, 1f32), 1f32));
        let b = bodies.add(Body::with_padding(Circle::new(10f32, 0f32, 1f32), 1f32));
        let mut bvh = Bvh::new();
        bvh.insert(&mut bodies, a).expect("fresh body must be insertable");
        bvh.insert(&mut bodies, b).expect("fresh body must be insertable");

        bodies[a].shape.x = 0.75f32;
        bodies[a].shape.radius = 0.5f32;
        assert_eq!(bvh.update(&mut bodies), 0);
        assert_eq!(bodies[a].cached_bounds(), Some(Aabb::from_extents(-2f32, -2f32, 2f32, 2f32)));
    }

    #[test]
    fn update_relocates_escaped_bodies() {
        let (mut bodies, ids, mut bvh) = populated(&[(0f32, 0f32), (5f32, 5f32), (0.5f32, 0.5f32)]);

        bodies[ids[0]].shape.x = 5.5f32;
        bodies[ids[0]].shape.y = 5.5f32;
        assert_eq!(bvh.update(&mut bodies), 1);
        assert!(bvh.validate(&bodies));
        assert_eq!(bodies[ids[0]].cached_bounds(), Some(Aabb::from_extents(4.5f32, 4.5f32, 6.5f32, 6.5f32)));
        assert_eq!(bodies[ids[0]].parent(), bodies[ids[1]].parent());
        assert_eq!(bvh.potentials(&bodies, ids[0]), vec![ids[1]]);
        assert!(bvh.potentials(&bodies, ids[2]).is_empty());

        assert_eq!(bvh.update(&mut bodies), 0);
    }

    #[test]
    fn update_relocates_on_padding_change() {
        let (mut bodies, ids, mut bvh) = populated(&[(0f32, 0f32), (5f32, 5f32)]);

        bodies[ids[1]].padding = 0.25f32;
        assert_eq!(bvh.update(&mut bodies), 1);
        assert_eq!(bodies[ids[1]].cached_bounds(), Some(Aabb::from_extents(3.75f32, 3.75f32, 6.25f32, 6.25f32)));

        bodies[ids[1]].padding = 0f32;
        assert_eq!(bvh.update(&mut bodies), 1);
        assert_eq!(bodies[ids[1]].cached_bounds(), Some(Aabb::from_extents(4f32, 4f32, 6f32, 6f32)));
        assert!(bvh.validate(&bodies));
    }

    #[test]
    fn relocate_refreshes_cached_bounds() {
        let (mut bodies, ids, mut bvh) = populated(&[(0f32, 0f32), (5f32, 5f32)]);
        bodies[ids[0]].shape.radius = 0.5f32;
        bvh.relocate(&mut bodies, ids[0]).expect("member must be relocatable");
        assert_eq!(bodies[ids[0]].cached_bounds(), Some(Aabb::from_extents(-0.5f32, -0.5f32, 0.5f32, 0.5f32)));
        assert!(bvh.validate(&bodies));
    }

    #[test]
    fn filter_rejects_candidates() {
        let (bodies, ids, bvh) = populated(&[(0f32, 0f32), (0.5f32, 0f32), (0f32, 0.5f32)]);
        let mut results = Vec::new();
        let mut calls = Vec::new();
        bvh.potentials_filtered(&bodies, ids[0], |lhs, rhs| {
            calls.push((lhs, rhs));
            rhs != ids[1]
        }, &mut results);
        assert_eq!(results, vec![ids[2]]);
        calls.sort();
        assert_eq!(calls, vec![(ids[0], ids[1]), (ids[0], ids[2])]);
    }

    #[test]
    fn query_bounds_includes_every_overlap() {
        let (bodies, ids, bvh) = populated(&[(0f32, 0f32), (5f32, 5f32), (0.5f32, 0.5f32)]);
        let mut results = Vec::new();
        bvh.query_bounds(&bodies, Aabb::from_extents(-0.5f32, -0.5f32, 0f32, 0f32), &mut results);
        results.sort();
        assert_eq!(results, vec![ids[0], ids[2]]);
    }

    #[test]
    fn potential_pairs() {
        let (bodies, ids, bvh) = populated(&[(0f32, 0f32), (5f32, 5f32), (0.5f32, 0.5f32), (5.5f32, 4.5f32)]);
        assert_eq!(bvh.potential_pairs(&bodies, |_, _| true), vec![(ids[0], ids[2]), (ids[1], ids[3])]);
        assert_eq!(bvh.potential_pairs(&bodies, |lhs, rhs| lhs != ids[1] && rhs != ids[1]), vec![(ids[0], ids[2])]);
    }

    #[cfg(feature="parallel")]
    #[test]
    fn par_potential_pairs() {
        let (bodies, _, bvh) = populated(&[(0f32, 0f32), (5f32, 5f32), (0.5f32, 0.5f32), (5.5f32, 4.5f32)]);
        assert_eq!(
            bvh.par_potential_pairs(&bodies, |_, _| true),
            bvh.potential_pairs(&bodies, |_, _| true));
    }

    #[test]
    fn clear_releases_ownership() {
        let (mut bodies, ids, mut bvh) = populated(&[(0f32, 0f32), (5f32, 5f32), (0.5f32, 0.5f32)]);
        bvh.clear(&mut bodies);
        assert!(bvh.is_empty());
        assert_eq!(bvh.branch_count(), 0);
        for &id in &ids {
            assert_eq!(bodies[id].owner(), None);
            assert_eq!(bodies[id].parent(), None);
        }

        let mut other = Bvh::new();
        other.insert(&mut bodies, ids[0]).expect("released body must be insertable");
    }

    #[test]
    fn builder() {
        let bvh = BvhBuilder::new()
            .with_member_capacity(16)
            .with_branch_capacity(16)
            .build();
        assert!(bvh.is_empty());
        assert_ne!(bvh.id(), Bvh::new().id());
    }
}
