//! enjon
//!
//! A deferred rendering core on wgpu. Geometry is written once into a
//! G-buffer, lights are accumulated additively into an HDR target, bright
//! parts are extracted and blurred in three cascades, and the result is tone
//! mapped, optionally anti-aliased with FXAA and presented together with
//! screen-space GUI sprites.
//!
//! High-level modules
//! - `camera`: fly camera, projection and controller
//! - `context`: window, device, surface and the renderer that draws into it
//! - `cvars`: named console variables over the render settings
//! - `data_structures`: meshes, textures, materials, lights and the scene
//! - `flow`: application event loop and the `GraphicsFlow` hooks
//! - `gaussian`: blur kernel weights
//! - `pipelines`: program descriptors and WGSL shaders
//! - `renderer`: the frame plan and the deferred renderer executing it
//! - `resources`: named asset caches and loaders
//! - `settings`: tone mapping, bloom, FXAA and debug view settings
//! - `shader`: program registry, uniform layouts and per-frame uniform arenas
//! - `sprite_batch`: batched textured quads for GUI and the present pass
//! - `targets`: render targets, the G-buffer and the bind stack
//!

pub mod camera;
pub mod context;
pub mod cvars;
pub mod data_structures;
pub mod flow;
pub mod gaussian;
pub mod pipelines;
pub mod renderer;
pub mod resources;
pub mod settings;
pub mod shader;
pub mod sprite_batch;
pub mod targets;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use wgpu;
pub use winit::event::{DeviceEvent, WindowEvent};

pub use context::Context;
pub use data_structures::scene::Scene;
pub use flow::{FlowConstructor, GraphicsFlow, Out, run};
pub use renderer::{DeferredRenderer, FrameCamera, FramePlan, PassKind, TargetKey};
pub use settings::{DebugView, RenderSettings};
