//! Spatial partitioning data structures
//!
//! Provides the quadtree index used for bounded-region and radius
//! proximity queries over scene objects.

mod quadtree;

pub use quadtree::{QuadTree, QuadTreeConfig, Rect};
