//! Engine data structures: what a frame is made of.
//!
//! - `texture` holds the GPU texture wrapper and creation utilities
//! - `mesh` has vertex layouts, CPU geometry and uploaded meshes
//! - `material` describes surfaces as a set of texture slots
//! - `renderable` places a mesh with a material in the world
//! - `quad_batch` collects world-space quads sharing a material
//! - `light` has the directional, point and spot lights plus ambient settings
//! - `scene` owns all of the above for the renderer to draw

pub mod light;
pub mod material;
pub mod mesh;
pub mod quad_batch;
pub mod renderable;
pub mod scene;
pub mod texture;
