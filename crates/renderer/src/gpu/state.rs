use std::time::{Duration, Instant};

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::binder::UniformSnapshot;
use crate::compile::PreparedShader;
use crate::types::{Antialiasing, ColorSpaceMode};

use super::context::SurfaceContext;
use super::pipeline::BoxPipeline;
use super::uniforms::ReactiveBoxUniforms;

/// Backdrop behind the box, `#0A0A10`.
const BACKDROP: wgpu::Color = wgpu::Color {
    r: 10.0 / 255.0,
    g: 10.0 / 255.0,
    b: 16.0 / 255.0,
    a: 1.0,
};

const STATS_WINDOW: Duration = Duration::from_secs(1);

pub(crate) struct GpuState {
    context: SurfaceContext,
    pipeline: BoxPipeline,
    msaa: Option<wgpu::TextureView>,
    stats: FrameStats,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        size: PhysicalSize<u32>,
        shader: &PreparedShader,
        antialiasing: Antialiasing,
        color_space: ColorSpaceMode,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = SurfaceContext::new(target, size, antialiasing, color_space)?;
        let pipeline = BoxPipeline::new(
            &context.device,
            context.format(),
            context.sample_count,
            shader,
        )?;
        tracing::debug!(
            adapter = %context.adapter_name,
            shader = %shader.path.display(),
            samples = context.sample_count,
            "GPU ready"
        );
        let msaa = msaa_view(&context);
        Ok(Self {
            context,
            pipeline,
            msaa,
            stats: FrameStats::new(Instant::now()),
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size()
    }

    pub(crate) fn frames_per_second(&self) -> f32 {
        self.stats.fps
    }

    pub(crate) fn resize(&mut self, size: PhysicalSize<u32>) {
        if self.context.resize(size) {
            self.msaa = msaa_view(&self.context);
        }
    }

    /// Re-applies the current configuration after a lost or outdated surface.
    pub(crate) fn recover(&mut self) {
        self.context.reconfigure();
        self.msaa = msaa_view(&self.context);
    }

    /// Uploads `snapshot` and draws one frame. Under FIFO presentation the
    /// present call paces this to the display refresh.
    pub(crate) fn render(&mut self, snapshot: &UniformSnapshot) -> Result<(), wgpu::SurfaceError> {
        let acquire_started = Instant::now();
        let frame = self.context.surface.get_current_texture()?;
        let acquire = acquire_started.elapsed();
        if acquire > self.stats.budget() * 2 {
            tracing::warn!(acquire_ms = acquire.as_millis(), "slow swapchain acquire");
        }

        if let Some(fps) = self.stats.record(Instant::now()) {
            tracing::debug!(
                fps = fps.round(),
                frames = self.stats.total,
                time = snapshot.time.seconds(),
                tilt_x = snapshot.tilt.x,
                tilt_y = snapshot.tilt.y,
                "render stats"
            );
        }

        self.pipeline
            .upload(&self.context.queue, &ReactiveBoxUniforms::from(snapshot));

        let target = frame.texture.create_view(&Default::default());
        let (view, resolve_target) = match &self.msaa {
            Some(msaa) => (msaa, Some(&target)),
            None => (&target, None),
        };
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("reactive box frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("reactive box"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(BACKDROP),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            self.pipeline.draw(&mut pass);
        }
        self.context.queue.submit([encoder.finish()]);
        frame.present();
        Ok(())
    }
}

fn msaa_view(context: &SurfaceContext) -> Option<wgpu::TextureView> {
    if context.sample_count <= 1 {
        return None;
    }
    let size = context.size();
    let texture = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("msaa target"),
        size: wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: context.sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: context.format(),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    Some(texture.create_view(&Default::default()))
}

/// Rolling frame rate, refreshed once per [`STATS_WINDOW`].
#[derive(Debug, Clone)]
struct FrameStats {
    window_start: Instant,
    in_window: u32,
    fps: f32,
    total: u64,
}

impl FrameStats {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            in_window: 0,
            fps: 60.0,
            total: 0,
        }
    }

    fn budget(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.fps.max(1.0))
    }

    /// Counts a frame; returns the new rate when a window closes.
    fn record(&mut self, now: Instant) -> Option<f32> {
        self.total += 1;
        self.in_window += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < STATS_WINDOW {
            return None;
        }
        self.fps = self.in_window as f32 / elapsed.as_secs_f32();
        self.in_window = 0;
        self.window_start = now;
        Some(self.fps)
    }
}
