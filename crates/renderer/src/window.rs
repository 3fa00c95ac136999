use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Sender, TrySendError};
use tilt::{
    FrameClock, FrameLoop, OrientationSampler, SamplerGuard, SamplingRate, SensorBackend,
    SignalCell, TiltController,
};
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::binder::UniformBinder;
use crate::compile::PreparedShader;
use crate::controls::{self, ControlState, KeyAction};
use crate::gpu::GpuState;
use crate::types::{ParamStore, RendererConfig, TiltMode};

const TITLE_REFRESH: Duration = Duration::from_millis(250);

/// Runtime collaborators handed to the window for the lifetime of the surface.
pub struct SurfaceInputs {
    pub controller: TiltController,
    pub params: ParamStore,
    /// Sensor to register while the surface is up. Ignored in static mode.
    pub sensor: Option<Box<dyn SensorBackend>>,
    pub rate: SamplingRate,
    pub clock: FrameClock,
}

/// Everything owned by the visible surface.
///
/// Field order is drop order: the GPU surface goes before the window it was
/// created from, and the sampler guard and frame loop are released with the
/// state whether the loop exits normally or unwinds.
struct WindowState {
    gpu: GpuState,
    window: Arc<Window>,
    binder: UniformBinder,
    controller: TiltController,
    controls: ControlState,
    title_prefix: String,
    last_title_update: Option<Instant>,
    refresh: Sender<Instant>,
    frame_loop: FrameLoop,
    sampler: Option<SamplerGuard<Box<dyn SensorBackend>>>,
}

impl WindowState {
    fn new(
        window: Arc<Window>,
        config: &RendererConfig,
        shader: &PreparedShader,
        inputs: SurfaceInputs,
    ) -> Result<Self> {
        let SurfaceInputs {
            controller,
            params,
            sensor,
            rate,
            clock,
        } = inputs;

        let gpu = GpuState::new(
            window.as_ref(),
            window.inner_size(),
            shader,
            config.antialiasing,
            config.color_space,
        )?;

        let time = SignalCell::new(clock.now());
        let (refresh, refresh_rx) = bounded::<Instant>(1);
        let frame_loop = FrameLoop::spawn(refresh_rx, clock, time.clone())
            .context("failed to spawn frame loop thread")?;

        let sampler = match (config.tilt_mode, sensor) {
            (TiltMode::Live, Some(backend)) => {
                Some(OrientationSampler::activate(backend, &controller, rate))
            }
            (TiltMode::Live, None) => {
                info!("no orientation sensor configured; tilt stays at rest");
                None
            }
            (TiltMode::Static, _) => {
                info!("static mode; orientation sensor left untouched");
                None
            }
        };

        let binder = UniformBinder::new(controller.reader(), time.reader(), params, config.tilt_mode);

        Ok(Self {
            gpu,
            window,
            binder,
            controller,
            controls: ControlState::default(),
            title_prefix: config.title.clone(),
            last_title_update: None,
            refresh,
            frame_loop,
            sampler,
        })
    }

    fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let size = self.gpu.size();
        let snapshot = self.binder.snapshot(size.width, size.height);
        self.gpu.render(&snapshot)?;
        // The present above blocked on vertical sync; this is the refresh tick.
        match self.refresh.try_send(Instant::now()) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                warn!("frame loop is gone; frame time will no longer advance");
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, action: KeyAction) {
        controls::apply(action, &mut self.controls, &self.controller, self.binder.params());
        self.last_title_update = None;
    }

    fn refresh_title(&mut self) {
        let now = Instant::now();
        if self
            .last_title_update
            .is_some_and(|last| now.saturating_duration_since(last) < TITLE_REFRESH)
        {
            return;
        }
        self.last_title_update = Some(now);
        let title = controls::overlay_title(
            &self.title_prefix,
            self.binder.tilt(),
            self.binder.time(),
            self.controller.sensor_status(),
        );
        let selection = self.controls.describe(&self.binder.params().get());
        self.window.set_title(&format!("{title} | {selection}"));
    }

    fn shutdown(mut self) {
        let frames = self.frame_loop.cancel();
        let sensor = self
            .sampler
            .as_ref()
            .map(|guard| guard.sensor_name().to_string());
        info!(
            frames,
            fps = self.gpu.frames_per_second().round(),
            sensor = sensor.as_deref().unwrap_or("none"),
            last_time = %self.binder.time(),
            "closing reactive box window"
        );
    }
}

/// Opens the window and runs the event loop on the calling thread until the
/// window is closed or `Esc` is pressed.
pub(crate) fn run_window(
    config: &RendererConfig,
    shader: &PreparedShader,
    inputs: SurfaceInputs,
) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let state = WindowState::new(window.clone(), config, shader, inputs)
        .context("failed to initialise window renderer")?;
    debug!(
        width = window_size.width,
        height = window_size.height,
        mode = ?config.tilt_mode,
        "window ready"
    );
    window.request_redraw();

    let mut state = Some(state);
    event_loop
        .run(move |event, elwt| {
            if let Event::LoopExiting = event {
                if let Some(finished) = state.take() {
                    finished.shutdown();
                }
                return;
            }
            let Some(current) = state.as_mut() else {
                return;
            };
            match event {
                Event::WindowEvent { window_id, event } if window_id == current.window.id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            elwt.exit();
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state != ElementState::Pressed || event.repeat {
                                return;
                            }
                            match controls::key_action(&event.logical_key) {
                                Some(KeyAction::Quit) => elwt.exit(),
                                Some(action) => current.handle_key(action),
                                None => {}
                            }
                        }
                        WindowEvent::Resized(new_size) => {
                            current.gpu.resize(new_size);
                        }
                        WindowEvent::ScaleFactorChanged {
                            mut inner_size_writer,
                            ..
                        } => {
                            let _ = inner_size_writer.request_inner_size(current.gpu.size());
                        }
                        WindowEvent::RedrawRequested => {
                            match current.render_frame() {
                                Ok(()) => current.refresh_title(),
                                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                                    current.gpu.recover();
                                }
                                Err(wgpu::SurfaceError::OutOfMemory) => {
                                    error!("surface out of memory; closing window");
                                    elwt.exit();
                                }
                                Err(wgpu::SurfaceError::Timeout) => {
                                    warn!("surface timeout; retrying next frame");
                                }
                                Err(other) => {
                                    warn!(error = ?other, "surface error; retrying next frame");
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    current.window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
