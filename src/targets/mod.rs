//! Render targets: offscreen colour targets, the G-buffer, and the
//! bind/unbind bookkeeping every pass goes through.

pub mod gbuffer;
pub mod render_target;
pub mod stack;

pub use gbuffer::{GBuffer, GBufferChannel};
pub use render_target::{Load, RenderTarget, TargetSize};
pub use stack::{BindMode, TargetId, TargetStack};
