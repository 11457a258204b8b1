//! Spatial octree over the current vorton positions.
//!
//! The tree is rebuilt from scratch once per fixed step, before any stage
//! workers are released, and is never mutated after that: the orchestrator
//! publishes it to workers as an `Arc<VortonTree>` snapshot inside each work
//! item, so all concurrent access during a stage is read-only.
//!
//! Every node carries aggregate quantities (total vorticity and the
//! vorticity-magnitude-weighted centroid of its subtree), which lets
//! influence queries summarize a distant subtree as a single synthetic
//! vorton instead of enumerating all of its members — the Barnes-Hut
//! admissibility idea applied to the Biot-Savart kernel.

use glam::Vec3;

use crate::buffer::VortonStore;
use crate::constants::{OPENING_RATIO, VORTON_RADIUS};
use crate::vorton::Vorton;

const ZERO_WEIGHT_EPS: f32 = 1e-12;

/// One node of the octree: an axis-aligned region with either eight children
/// or a leaf list of the vortons it encloses.
pub struct TreeNode {
    min: Vec3,
    max: Vec3,
    children: Option<Box<[TreeNode; 8]>>,
    /// Leaf payload: (vorton id, snapshot of its back-buffer state).
    items: Vec<(u32, Vorton)>,
    /// Number of vortons in this subtree.
    count: usize,
    /// Sum of subtree vorticity.
    total_vorticity: Vec3,
    /// Sum of |vorticity| over the subtree.
    weight: f32,
    /// Sum of subtree positions, the fallback centroid for zero vorticity.
    position_sum: Vec3,
    /// Vorticity-magnitude-weighted mean position of the subtree.
    centroid: Vec3,
}

impl TreeNode {
    fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min,
            max,
            children: None,
            items: Vec::new(),
            count: 0,
            total_vorticity: Vec3::ZERO,
            weight: 0.0,
            position_sum: Vec3::ZERO,
            centroid: (min + max) * 0.5,
        }
    }

    /// Recursively subdivide this node `levels` more times, eight equal
    /// octants per level.
    fn split_to(&mut self, levels: usize) {
        if levels == 0 {
            return;
        }
        let children = std::array::from_fn(|octant| {
            let (min, max) = octant_bounds(self.min, self.max, octant);
            let mut child = TreeNode::new(min, max);
            child.split_to(levels - 1);
            child
        });
        self.children = Some(Box::new(children));
    }

    /// Descend by point-octant test and append the vorton to the containing
    /// leaf. A position exactly on a split plane goes to the lower octant.
    fn insert(&mut self, id: u32, vorton: Vorton) {
        let center = (self.min + self.max) * 0.5;
        match self.children.as_deref_mut() {
            Some(children) => {
                children[octant_index(vorton.position, center)].insert(id, vorton)
            }
            None => self.items.push((id, vorton)),
        }
    }

    /// Post-order aggregate pass. Must run after all insertions and before
    /// any influence query.
    fn update_derived_quantities(&mut self) {
        self.count = 0;
        self.total_vorticity = Vec3::ZERO;
        self.weight = 0.0;
        self.position_sum = Vec3::ZERO;
        let mut weighted_sum = Vec3::ZERO;

        match self.children.as_deref_mut() {
            Some(children) => {
                for child in children.iter_mut() {
                    child.update_derived_quantities();
                    self.count += child.count;
                    self.total_vorticity += child.total_vorticity;
                    self.weight += child.weight;
                    self.position_sum += child.position_sum;
                    weighted_sum += child.centroid * child.weight;
                }
            }
            None => {
                for (_, v) in &self.items {
                    let w = v.vorticity.length();
                    self.count += 1;
                    self.total_vorticity += v.vorticity;
                    self.weight += w;
                    self.position_sum += v.position;
                    weighted_sum += v.position * w;
                }
            }
        }

        self.centroid = if self.weight > ZERO_WEIGHT_EPS {
            weighted_sum / self.weight
        } else if self.count > 0 {
            self.position_sum / self.count as f32
        } else {
            (self.min + self.max) * 0.5
        };
    }

    fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// True if this subtree looks small enough from `point` to be replaced
    /// by its aggregate vorton.
    fn admissible_from(&self, point: Vec3) -> bool {
        if self.contains(point) {
            return false;
        }
        let extent = (self.max - self.min).max_element();
        let dist = (point - self.centroid).length();
        extent < OPENING_RATIO * dist
    }

    fn gather_influences(&self, point: Vec3, exclude: Option<u32>, out: &mut Vec<Vorton>) {
        if self.count == 0 {
            return;
        }
        if self.admissible_from(point) {
            out.push(Vorton::new(self.centroid, self.total_vorticity));
            return;
        }
        match self.children.as_deref() {
            Some(children) => {
                for child in children {
                    child.gather_influences(point, exclude, out);
                }
            }
            None => {
                for &(id, v) in &self.items {
                    if Some(id) != exclude {
                        out.push(v);
                    }
                }
            }
        }
    }

    fn collect_leaf_groups(&self, out: &mut Vec<Vec<u32>>) {
        match self.children.as_deref() {
            Some(children) => {
                for child in children {
                    child.collect_leaf_groups(out);
                }
            }
            None => {
                if !self.items.is_empty() {
                    out.push(self.items.iter().map(|&(id, _)| id).collect());
                }
            }
        }
    }

    /// Region lower bound.
    pub fn min(&self) -> Vec3 {
        self.min
    }

    /// Region upper bound.
    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Child nodes, or `None` at a leaf.
    pub fn children(&self) -> Option<&[TreeNode]> {
        self.children.as_deref().map(|c| c.as_slice())
    }

    /// Number of vortons in this subtree.
    pub fn vorton_count(&self) -> usize {
        self.count
    }

    /// Sum of vorticity over this subtree.
    pub fn total_vorticity(&self) -> Vec3 {
        self.total_vorticity
    }

    /// Vorticity-weighted centroid of this subtree.
    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }
}

/// Octant index for `point` relative to `center`.
///
/// Bit 0 is x, bit 1 is y, bit 2 is z; a coordinate exactly on the split
/// plane resolves to the lower octant so assignment is deterministic.
fn octant_index(point: Vec3, center: Vec3) -> usize {
    (point.x > center.x) as usize
        | ((point.y > center.y) as usize) << 1
        | ((point.z > center.z) as usize) << 2
}

fn octant_bounds(min: Vec3, max: Vec3, octant: usize) -> (Vec3, Vec3) {
    let center = (min + max) * 0.5;
    let pick = |bit: bool, lo: f32, mid: f32, hi: f32| if bit { (mid, hi) } else { (lo, mid) };
    let (x0, x1) = pick(octant & 1 != 0, min.x, center.x, max.x);
    let (y0, y1) = pick(octant & 2 != 0, min.y, center.y, max.y);
    let (z0, z1) = pick(octant & 4 != 0, min.z, center.z, max.z);
    (Vec3::new(x0, y0, z0), Vec3::new(x1, y1, z1))
}

/// An immutable octree built over the back-buffer vorton state.
pub struct VortonTree {
    root: TreeNode,
}

impl VortonTree {
    /// Build a tree over the store's current (back-buffer) positions,
    /// pre-split `depth` levels, with every vorton inserted into exactly one
    /// leaf and all aggregates computed.
    pub fn build(store: &VortonStore, depth: usize) -> Self {
        let (min, max) = Self::bounds_of(store);
        let mut root = TreeNode::new(min, max);
        root.split_to(depth);
        for i in 0..store.len() {
            root.insert(i as u32, Vorton::new(store.position(i), store.vorticity(i)));
        }
        root.update_derived_quantities();
        Self { root }
    }

    fn bounds_of(store: &VortonStore) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for i in 0..store.len() {
            let p = store.position(i);
            min = min.min(p);
            max = max.max(p);
        }
        if !min.is_finite() || !max.is_finite() {
            return (Vec3::splat(-1.0), Vec3::splat(1.0));
        }
        // Pad so coincident vortons still get a non-degenerate region.
        (min - Vec3::splat(VORTON_RADIUS), max + Vec3::splat(VORTON_RADIUS))
    }

    /// Root node, for diagnostics and traversal.
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Bounding region of the whole tree.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.root.min, self.root.max)
    }

    /// Append the vortons (real or aggregate) whose combined contribution
    /// approximates the field from all vortons at `point`. Leaf entries with
    /// id `exclude` are skipped, which is how advection drops a vorton's
    /// self-influence.
    pub fn influential_vortons(&self, point: Vec3, exclude: Option<u32>, out: &mut Vec<Vorton>) {
        self.root.gather_influences(point, exclude, out);
    }

    /// Append the vorton-id list of every non-empty leaf. Vortons in the
    /// same leaf are close enough to form one diffusion group.
    pub fn leaf_groups(&self, out: &mut Vec<Vec<u32>>) {
        self.root.collect_leaf_groups(out);
    }
}
