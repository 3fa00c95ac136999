use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::{PresentMode, TextureFormat, TextureFormatFeatureFlags};
use winit::dpi::PhysicalSize;

use crate::types::{Antialiasing, ColorSpaceMode};

/// Highest sample count `Antialiasing::Auto` asks for.
const AUTO_SAMPLE_CEILING: u32 = 4;

/// Device, queue and configured surface for one window.
pub(crate) struct SurfaceContext {
    _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub sample_count: u32,
    pub adapter_name: String,
}

impl SurfaceContext {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
        color_space: ColorSpaceMode,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let raw_window = target
            .window_handle()
            .map_err(|err| anyhow!("window handle unavailable: {err}"))?
            .as_raw();
        let raw_display = target
            .display_handle()
            .map_err(|err| anyhow!("display handle unavailable: {err}"))?
            .as_raw();

        // The window is dropped after the surface; `WindowState` owns both.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: raw_display,
                raw_window_handle: raw_window,
            })
        }
        .context("failed to create window surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no GPU adapter can present to this window")?;
        let info = adapter.get_info();
        let software = info.device_type == wgpu::DeviceType::Cpu;
        tracing::debug!(
            adapter = %info.name,
            backend = ?info.backend,
            software,
            "picked GPU adapter"
        );

        let caps = surface.get_capabilities(&adapter);
        let format = pick_surface_format(&caps.formats, color_space)
            .ok_or_else(|| anyhow!("surface offers no texture formats"))?;
        let features = adapter.get_texture_format_features(format);
        let sample_count = pick_sample_count(
            &features.flags.supported_sample_counts(),
            antialiasing,
            features
                .flags
                .contains(TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE),
            software,
        );

        let required_features = if sample_count > AUTO_SAMPLE_CEILING {
            wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES
        } else {
            wgpu::Features::empty()
        };
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("reactibox device"),
            required_features,
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to open GPU device")?;

        let present_mode = pick_present_mode(&caps.present_modes);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: initial_size.width.max(1),
            height: initial_size.height.max(1),
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: Vec::new(),
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        tracing::debug!(?format, ?present_mode, sample_count, "surface configured");

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            sample_count,
            adapter_name: info.name,
        })
    }

    pub(crate) fn format(&self) -> TextureFormat {
        self.config.format
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    /// Reconfigures the surface; zero-area sizes (minimised windows) are ignored.
    pub(crate) fn resize(&mut self, size: PhysicalSize<u32>) -> bool {
        if size.width == 0 || size.height == 0 || size == self.size() {
            return false;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
        true
    }

    pub(crate) fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

/// sRGB formats when colors should be treated as linear, plain formats
/// otherwise. Falls back to the first advertised format.
fn pick_surface_format(formats: &[TextureFormat], color_space: ColorSpaceMode) -> Option<TextureFormat> {
    let want_srgb = color_space == ColorSpaceMode::Linear;
    let first = formats.first().copied()?;
    match formats.iter().copied().find(|f| f.is_srgb() == want_srgb) {
        Some(format) => Some(format),
        None => {
            tracing::warn!(fallback = ?first, want_srgb, "no surface format matches the color space");
            Some(first)
        }
    }
}

fn pick_sample_count(
    supported: &[u32],
    antialiasing: Antialiasing,
    resolvable: bool,
    software: bool,
) -> u32 {
    let best_at_most = |ceiling: u32| {
        supported
            .iter()
            .copied()
            .filter(|&count| count <= ceiling)
            .max()
            .unwrap_or(1)
    };
    let count = match antialiasing {
        Antialiasing::Off => 1,
        Antialiasing::Auto => best_at_most(AUTO_SAMPLE_CEILING),
        Antialiasing::Samples(requested) if supported.contains(&requested) => requested,
        Antialiasing::Samples(requested) => {
            let fallback = best_at_most(requested);
            tracing::warn!(requested, fallback, ?supported, "MSAA sample count unsupported");
            fallback
        }
    };
    if count > 1 && !resolvable {
        tracing::warn!("surface format cannot resolve MSAA; rendering without it");
        return 1;
    }
    if count > 1 && software {
        tracing::warn!(count, "software adapter; rendering without MSAA");
        return 1;
    }
    count
}

/// FIFO waits for vertical blank, which is what turns the post-present tick
/// into a display-refresh signal. Anything else is a degraded fallback.
fn pick_present_mode(modes: &[PresentMode]) -> PresentMode {
    if modes.contains(&PresentMode::Fifo) {
        return PresentMode::Fifo;
    }
    let fallback = modes.first().copied().unwrap_or(PresentMode::Fifo);
    tracing::warn!(?fallback, "FIFO presentation unavailable; frame time follows the fallback mode");
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_format_follows_color_space() {
        let formats = [TextureFormat::Bgra8UnormSrgb, TextureFormat::Bgra8Unorm];
        assert_eq!(
            pick_surface_format(&formats, ColorSpaceMode::Linear),
            Some(TextureFormat::Bgra8UnormSrgb)
        );
        assert_eq!(
            pick_surface_format(&formats, ColorSpaceMode::Gamma),
            Some(TextureFormat::Bgra8Unorm)
        );
        assert_eq!(
            pick_surface_format(&formats[..1], ColorSpaceMode::Auto),
            Some(TextureFormat::Bgra8UnormSrgb)
        );
        assert_eq!(pick_surface_format(&[], ColorSpaceMode::Auto), None);
    }

    #[test]
    fn auto_antialiasing_caps_at_four_samples() {
        assert_eq!(pick_sample_count(&[1, 2, 4, 8], Antialiasing::Auto, true, false), 4);
        assert_eq!(pick_sample_count(&[1, 2], Antialiasing::Auto, true, false), 2);
        assert_eq!(pick_sample_count(&[1, 4], Antialiasing::Off, true, false), 1);
    }

    #[test]
    fn unsupported_sample_count_falls_back_downwards() {
        assert_eq!(pick_sample_count(&[1, 2, 4, 8], Antialiasing::Samples(8), true, false), 8);
        assert_eq!(pick_sample_count(&[1, 4], Antialiasing::Samples(8), true, false), 4);
        assert_eq!(pick_sample_count(&[1], Antialiasing::Samples(16), true, false), 1);
    }

    #[test]
    fn msaa_disabled_without_resolve_or_on_software() {
        assert_eq!(pick_sample_count(&[1, 4], Antialiasing::Samples(4), false, false), 1);
        assert_eq!(pick_sample_count(&[1, 4], Antialiasing::Auto, true, true), 1);
    }

    #[test]
    fn present_mode_prefers_fifo() {
        assert_eq!(
            pick_present_mode(&[PresentMode::Mailbox, PresentMode::Fifo]),
            PresentMode::Fifo
        );
        assert_eq!(pick_present_mode(&[PresentMode::Immediate]), PresentMode::Immediate);
        assert_eq!(pick_present_mode(&[]), PresentMode::Fifo);
    }
}
