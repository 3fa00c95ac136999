//! Renderer crate for the reactive box.
//!
//! Glues the winit window, the `wgpu` pipeline and the GLSL wrapping that
//! feeds the tilt-driven uniforms to a `mainImage` fragment shader:
//!
//! ```text
//!   reactibox CLI
//!          │ RendererConfig + SurfaceInputs
//!          ▼
//!   Renderer::run ──▶ WindowState ──▶ winit event loop ──▶ render_frame()
//!                          │                                   │
//!                          ├─ SamplerGuard (sensor thread)     ├─▶ UniformBinder::snapshot ─▶ GPU UBO
//!                          └─ FrameLoop  ◀── refresh tick ◀────┘   (after each present)
//! ```
//!
//! The shader is read and validated by [`Renderer::new`] so a broken shader
//! fails before any window or GPU device exists.

mod binder;
mod compile;
mod controls;
mod gpu;
mod types;
mod window;

use anyhow::Result;

pub use binder::{UniformBinder, UniformSnapshot, UniformValue, UNIFORM_NAMES};
pub use compile::PreparedShader;
pub use controls::{key_action, overlay_title, ColorTarget, ControlState, KeyAction, Tunable};
pub use types::{
    Antialiasing, ColorSpaceMode, FaceColors, ParamStore, RendererConfig, Rgb, TiltMode,
    VisualParams,
};
pub use window::SurfaceInputs;

/// High-level entry point that owns the configuration and the validated shader.
pub struct Renderer {
    config: RendererConfig,
    shader: PreparedShader,
}

impl Renderer {
    /// Loads and validates the configured shader.
    pub fn new(config: RendererConfig) -> Result<Self> {
        let shader = PreparedShader::load(&config.shader_source)?;
        Ok(Self { config, shader })
    }

    /// Uses a shader that was already validated, e.g. one embedded in the
    /// binary. `config.shader_source` is replaced by the shader's path.
    pub fn with_shader(mut config: RendererConfig, shader: PreparedShader) -> Self {
        config.shader_source = shader.path.clone();
        Self { config, shader }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn shader(&self) -> &PreparedShader {
        &self.shader
    }

    /// Opens the window and blocks until it closes. Must be called from the
    /// main thread on platforms that require it.
    pub fn run(self, inputs: SurfaceInputs) -> Result<()> {
        window::run_window(&self.config, &self.shader, inputs)
    }
}
