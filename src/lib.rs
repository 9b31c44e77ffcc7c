//! figurine
//!
//! A small cross-platform character viewer. A class model and an ability
//! model are loaded from glTF files, normalized to the same size and shown
//! side by side in a group that can be spun with the mouse. The crate runs
//! natively and in the browser (WebGL2).
//!
//! High-level modules
//! - `app`: the session (selection, cache, controller) and the event loop
//! - `camera`: fixed perspective camera and its uniform
//! - `config`: `viewer.ron` settings with defaults for every knob
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `controller`: drag and inertia rotation of the display group
//! - `data_structures`: scene graph, instances, GPU models and textures
//! - `keys`: class and ability identifiers
//! - `manager`: concurrent loading and caching of the models
//! - `pipelines`: the model and background render pipelines
//! - `render`: per-frame upload and drawing
//! - `resources`: asset sources and glTF parsing
//! - `web`: DOM glue for the browser build
//!

pub mod app;
pub mod camera;
pub mod config;
pub mod context;
pub mod controller;
pub mod data_structures;
pub mod keys;
pub mod manager;
pub mod pipelines;
pub mod render;
pub mod resources;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use app::run;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() -> Result<(), wasm_bindgen::JsValue> {
    run().map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{:#}", e)))
}
