//! GPU side of the reactive box.
//!
//! - `context` picks adapter, surface format, MSAA and present mode. FIFO is
//!   preferred so every present lines up with the display refresh.
//! - `pipeline` owns the fullscreen-triangle pipeline and its uniform buffer.
//! - `uniforms` mirrors the injected `ReactiveBoxParams` block.
//! - `state` ties them together behind the `GpuState` API used by `window`.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use state::GpuState;
