//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! A binary tree over any collection of `Primitive`s. Built once, then only
//! queried. Leaves keep indices into the primitive list, so primitives stay
//! in the order they were given and hit records report that index.

use crate::primitive::PrimitiveHit;
use crate::{Intersection, Primitive, Ray};
use lux_math::{Aabb, Interval, Vec3};
use serde::{Deserialize, Serialize};

/// Number of centroid buckets evaluated by the SAH split.
const SAH_BUCKETS: usize = 12;

/// Relative cost of one extra traversal step against one primitive test.
const SAH_TRAVERSAL_COST: f32 = 0.125;

/// Ray parameters a node's bounds are tested over before any hit is found.
const SEARCH_RANGE: Interval = Interval {
    min: 0.0,
    max: f32::INFINITY,
};

/// How a node's primitives are divided between its two children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    /// Median split on the longest centroid axis.
    #[default]
    Naive,
    /// Bucketed surface area heuristic.
    Sah,
}

/// BVH node - either a branch with two children or a leaf with primitives.
enum BvhNode {
    /// Internal node with two children.
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    /// Leaf node with a small number of primitive indices.
    Leaf { indices: Vec<usize>, bbox: Aabb },
    /// Empty tree.
    Empty,
}

impl BvhNode {
    fn bounding_box(&self) -> Aabb {
        match self {
            BvhNode::Empty => Aabb::EMPTY,
            BvhNode::Leaf { bbox, .. } => *bbox,
            BvhNode::Branch { bbox, .. } => *bbox,
        }
    }
}

/// Per-primitive data used only while building.
#[derive(Clone, Copy)]
struct BuildItem {
    index: usize,
    bbox: Aabb,
    centroid: Vec3,
}

#[derive(Debug, Default, Clone, Copy)]
struct BuildStats {
    nodes: usize,
    leaves: usize,
    depth: usize,
}

/// Bounding volume hierarchy owning its primitives.
pub struct Bvh<P> {
    primitives: Vec<P>,
    root: BvhNode,
    depth: usize,
}

impl<P: Primitive> Bvh<P> {
    /// Build a BVH over `primitives`.
    ///
    /// Nodes with at most `max_prims_in_node` primitives become leaves
    /// (a value of 0 is treated as 1).
    pub fn new(primitives: Vec<P>, max_prims_in_node: usize, split: SplitMethod) -> Self {
        if primitives.is_empty() {
            return Self {
                primitives,
                root: BvhNode::Empty,
                depth: 0,
            };
        }

        let mut items: Vec<BuildItem> = primitives
            .iter()
            .enumerate()
            .map(|(index, p)| {
                let bbox = p.bounding_box();
                BuildItem {
                    index,
                    bbox,
                    centroid: bbox.centroid(),
                }
            })
            .collect();

        let mut stats = BuildStats::default();
        let root = Self::build(&mut items, max_prims_in_node.max(1), split, 1, &mut stats);

        log::debug!(
            "BVH ({:?}): {} primitives, {} nodes, {} leaves, depth {}",
            split,
            primitives.len(),
            stats.nodes,
            stats.leaves,
            stats.depth
        );

        Self {
            primitives,
            root,
            depth: stats.depth,
        }
    }

    /// Recursive BVH construction.
    fn build(
        items: &mut [BuildItem],
        max_prims: usize,
        split: SplitMethod,
        depth: usize,
        stats: &mut BuildStats,
    ) -> BvhNode {
        stats.nodes += 1;
        stats.depth = stats.depth.max(depth);

        let bounds = items
            .iter()
            .fold(Aabb::EMPTY, |acc, item| Aabb::surrounding(&acc, &item.bbox));

        // Create leaf for small sets
        if items.len() <= max_prims {
            stats.leaves += 1;
            return BvhNode::Leaf {
                indices: items.iter().map(|item| item.index).collect(),
                bbox: bounds,
            };
        }

        // Compute centroid bounds to choose split axis
        let centroid_bounds = items
            .iter()
            .fold(Aabb::EMPTY, |acc, item| acc.including(item.centroid));
        let axis = centroid_bounds.longest_axis();

        let mid = match split {
            SplitMethod::Naive => None,
            SplitMethod::Sah => sah_partition(items, &bounds, &centroid_bounds, axis),
        }
        .unwrap_or_else(|| median_partition(items, axis));

        let (left_items, right_items) = items.split_at_mut(mid);
        let left = Self::build(left_items, max_prims, split, depth + 1, stats);
        let right = Self::build(right_items, max_prims, split, depth + 1, stats);

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox: bounds,
        }
    }

    /// Nearest primitive hit along the ray: its index and distance.
    pub fn nearest(&self, ray: &Ray) -> Option<(usize, PrimitiveHit)> {
        let mut closest = None;
        self.visit(&self.root, ray, &mut closest);
        closest
    }

    fn visit(&self, node: &BvhNode, ray: &Ray, closest: &mut Option<(usize, PrimitiveHit)>) {
        let range = match *closest {
            Some((_, hit)) => SEARCH_RANGE.clip_max(hit.distance),
            None => SEARCH_RANGE,
        };

        match node {
            BvhNode::Empty => {}

            BvhNode::Leaf { indices, bbox } => {
                if !bbox.hit(ray, range) {
                    return;
                }
                for &i in indices {
                    if let Some(hit) = self.primitives[i].intersect(ray) {
                        let current = closest.map_or(f32::INFINITY, |(_, c)| c.distance);
                        if hit.distance < current {
                            *closest = Some((i, hit));
                        }
                    }
                }
            }

            BvhNode::Branch { left, right, bbox } => {
                if !bbox.hit(ray, range) {
                    return;
                }
                self.visit(left, ray, closest);
                // Right child is tested against the closest hit found so far
                self.visit(right, ray, closest);
            }
        }
    }

    /// Nearest intersection of a ray against the whole collection.
    pub fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        match self.nearest(ray) {
            Some((i, _)) => self.primitives[i].intersection(ray).with_primitive(i),
            None => Intersection::miss(),
        }
    }
}

impl<P> Bvh<P> {
    /// The primitives, in the order they were given.
    pub fn primitives(&self) -> &[P] {
        &self.primitives
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Bounds of the whole collection.
    pub fn bounding_box(&self) -> Aabb {
        self.root.bounding_box()
    }

    /// Number of levels in the tree.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Split at the median centroid along `axis`.
fn median_partition(items: &mut [BuildItem], axis: usize) -> usize {
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| {
        a.centroid[axis]
            .partial_cmp(&b.centroid[axis])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    mid
}

/// Split at the cheapest bucket boundary by surface area heuristic.
///
/// Returns `None` when the centroids cannot be separated along `axis`.
fn sah_partition(
    items: &mut [BuildItem],
    bounds: &Aabb,
    centroid_bounds: &Aabb,
    axis: usize,
) -> Option<usize> {
    if centroid_bounds.axis_interval(axis).size() <= 0.0 {
        return None;
    }

    let bucket_of = |item: &BuildItem| -> usize {
        let b = (SAH_BUCKETS as f32 * centroid_bounds.offset(item.centroid)[axis]) as usize;
        b.min(SAH_BUCKETS - 1)
    };

    let mut counts = [0usize; SAH_BUCKETS];
    let mut boxes = [Aabb::EMPTY; SAH_BUCKETS];
    for item in items.iter() {
        let b = bucket_of(item);
        counts[b] += 1;
        boxes[b] = Aabb::surrounding(&boxes[b], &item.bbox);
    }

    let total_area = bounds.surface_area();
    if total_area <= 0.0 {
        return None;
    }

    // Cost of splitting after each bucket boundary
    let mut best: Option<(usize, f32)> = None;
    for boundary in 0..SAH_BUCKETS - 1 {
        let (below, above) = (&boxes[..=boundary], &boxes[boundary + 1..]);
        let count_below: usize = counts[..=boundary].iter().sum();
        let count_above: usize = counts[boundary + 1..].iter().sum();
        if count_below == 0 || count_above == 0 {
            continue;
        }

        let area = |boxes: &[Aabb]| {
            boxes
                .iter()
                .fold(Aabb::EMPTY, |acc, b| Aabb::surrounding(&acc, b))
                .surface_area()
        };
        let cost = SAH_TRAVERSAL_COST
            + (count_below as f32 * area(below) + count_above as f32 * area(above)) / total_area;

        if best.map_or(true, |(_, c)| cost < c) {
            best = Some((boundary, cost));
        }
    }

    let (boundary, _) = best?;
    items.sort_unstable_by_key(bucket_of);
    let mid = items.iter().take_while(|item| bucket_of(*item) <= boundary).count();

    (mid > 0 && mid < items.len()).then_some(mid)
}
