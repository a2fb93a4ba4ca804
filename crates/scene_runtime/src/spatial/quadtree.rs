//! Quadtree spatial partitioning structure
//!
//! Divides the XZ plane into hierarchical quadrants for fast
//! bounded-region queries. Each node splits into 4 quadrants once
//! its local object count exceeds a threshold.

/// Axis-aligned rectangle on the XZ plane, carrying the id of the
/// scene object it bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Minimum x coordinate
    pub x: f32,
    /// Minimum z coordinate
    pub z: f32,
    /// Width along x
    pub w: f32,
    /// Depth along z
    pub h: f32,
    /// Opaque id of the object this rectangle bounds
    pub id: u64,
}

impl Rect {
    /// Create a rectangle from its minimum corner and extents
    pub fn new(x: f32, z: f32, w: f32, h: f32, id: u64) -> Self {
        Self { x, z, w, h, id }
    }

    /// Check whether two rectangles overlap
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && self.x + self.w > other.x
            && self.z < other.z + other.h
            && self.z + self.h > other.z
    }
}

/// Configuration for quadtree behavior
#[derive(Debug, Clone, Copy)]
pub struct QuadTreeConfig {
    /// Maximum objects per node before splitting
    pub max_objects: usize,

    /// Maximum subdivision depth
    pub max_levels: u32,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            max_objects: 10,
            max_levels: 5,
        }
    }
}

/// Single node in the quadtree hierarchy
///
/// An inserted rectangle lives in exactly one node: either a leaf that
/// has not exceeded capacity, or the deepest child whose quadrant fully
/// contains it. Rectangles straddling a quadrant boundary stay in the
/// parent.
#[derive(Debug)]
pub struct QuadTree {
    /// World-space bounds of this node
    bounds: Rect,

    /// Objects stored at this level
    objects: Vec<Rect>,

    /// Child quadrants, empty until this node splits
    ///
    /// Index layout: 0 = top-right, 1 = top-left,
    /// 2 = bottom-left, 3 = bottom-right.
    children: Vec<QuadTree>,

    /// Depth in the tree (0 = root)
    level: u32,

    config: QuadTreeConfig,
}

impl QuadTree {
    /// Create a new quadtree covering `bounds`
    pub fn new(bounds: Rect, config: QuadTreeConfig) -> Self {
        Self::with_level(bounds, config, 0)
    }

    fn with_level(bounds: Rect, config: QuadTreeConfig, level: u32) -> Self {
        Self {
            bounds,
            objects: Vec::new(),
            children: Vec::new(),
            level,
            config,
        }
    }

    /// Check if this node is a leaf (has not split)
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Bounds covered by this node
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Quadrant index for a rectangle, or -1 if it does not fit
    /// entirely within a single quadrant on both axes.
    fn quadrant_index(&self, rect: &Rect) -> i32 {
        let mid_x = self.bounds.x + self.bounds.w / 2.0;
        let mid_z = self.bounds.z + self.bounds.h / 2.0;

        // "Top" is the half with smaller z, matching screen-space rows.
        let fits_top = rect.z + rect.h < mid_z;
        let fits_bottom = rect.z > mid_z;
        let fits_left = rect.x + rect.w < mid_x;
        let fits_right = rect.x > mid_x;

        if fits_right && fits_top {
            0
        } else if fits_left && fits_top {
            1
        } else if fits_left && fits_bottom {
            2
        } else if fits_right && fits_bottom {
            3
        } else {
            -1
        }
    }

    /// Split this node into 4 equal quadrants and push down every
    /// local object that fits entirely within one of them.
    fn split(&mut self) {
        let half_w = self.bounds.w / 2.0;
        let half_h = self.bounds.h / 2.0;
        let x = self.bounds.x;
        let z = self.bounds.z;
        let next = self.level + 1;

        self.children = vec![
            // 0: top-right
            QuadTree::with_level(Rect::new(x + half_w, z, half_w, half_h, 0), self.config, next),
            // 1: top-left
            QuadTree::with_level(Rect::new(x, z, half_w, half_h, 0), self.config, next),
            // 2: bottom-left
            QuadTree::with_level(Rect::new(x, z + half_h, half_w, half_h, 0), self.config, next),
            // 3: bottom-right
            QuadTree::with_level(
                Rect::new(x + half_w, z + half_h, half_w, half_h, 0),
                self.config,
                next,
            ),
        ];

        // Redistribute local objects; straddlers stay behind.
        let existing = std::mem::take(&mut self.objects);
        for rect in existing {
            match self.quadrant_index(&rect) {
                -1 => self.objects.push(rect),
                idx => self.children[idx as usize].insert(rect),
            }
        }
    }

    /// Insert a rectangle into this node or the matching quadrant child
    pub fn insert(&mut self, rect: Rect) {
        if !self.is_leaf() {
            let idx = self.quadrant_index(&rect);
            if idx != -1 {
                self.children[idx as usize].insert(rect);
                return;
            }
        }

        self.objects.push(rect);

        if self.is_leaf()
            && self.objects.len() > self.config.max_objects
            && self.level < self.config.max_levels
        {
            self.split();
        }
    }

    /// Collect all stored rectangles intersecting `range` into `found`
    ///
    /// Traversal is pre-order: a node's local objects are appended
    /// before any of its children are visited.
    pub fn query(&self, range: &Rect, found: &mut Vec<Rect>) {
        if !self.bounds.intersects(range) {
            return;
        }

        for rect in &self.objects {
            if rect.intersects(range) {
                found.push(*rect);
            }
        }

        for child in &self.children {
            child.query(range, found);
        }
    }

    /// Recursively empty the tree, collapsing it to a single empty leaf
    pub fn clear(&mut self) {
        self.objects.clear();
        for child in &mut self.children {
            child.clear();
        }
        self.children.clear();
    }

    /// Total rectangles stored in this node and all children
    pub fn len(&self) -> usize {
        self.objects.len() + self.children.iter().map(QuadTree::len).sum::<usize>()
    }

    /// Whether the tree holds no rectangles
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
