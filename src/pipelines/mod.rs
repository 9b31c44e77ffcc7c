//! Render pipelines.
//!
//! - `basic` is the lit, textured model pipeline (single and double sided)
//! - `light` holds the light uniform shared by the model pipelines
//! - `background` draws an optional image behind the models

pub mod background;
pub mod basic;
pub mod light;
