//! Viewer data structures: scene graphs, instances, vertices and textures.
//!
//! - `scene_graph` holds the CPU-side model trees and the display group
//! - `instance` holds node transforms and their GPU form
//! - `model` contains the vertex layout and the uploaded GPU copies
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
