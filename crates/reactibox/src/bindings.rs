//! Maps `reactibox.toml` and command-line flags onto renderer and pipeline
//! types. Command-line flags win over the config file.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use boxconfig::{
    AntialiasSetting, BoxConfig, ColorSection, ColorSpaceSetting, HexColor, RateSetting,
    SensorSource, VisualSection,
};
use renderer::{Antialiasing, ColorSpaceMode, Rgb, VisualParams};
use tilt::{
    NullSensor, ReplaySensor, SamplingRate, SensorBackend, SmoothingCoefficient, StreamSensor,
    SyntheticSensor,
};

use crate::cli::{RunArgs, SourceArgs};

/// How to build the orientation sensor for this run.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorPlan {
    pub source: SensorSource,
    pub recording: Option<PathBuf>,
    pub looping: bool,
    pub rate: SamplingRate,
    pub seed: Option<u64>,
    pub amplitude: Option<f32>,
    pub period: Option<std::time::Duration>,
}

impl SensorPlan {
    pub fn resolve(args: &SourceArgs, config: &BoxConfig) -> Result<Self> {
        let source = if args.replay.is_some() {
            SensorSource::Replay
        } else {
            args.sensor.unwrap_or(config.sensor.source)
        };
        let recording = args.replay.clone().or_else(|| config.sensor.path.clone());
        if source == SensorSource::Replay && recording.is_none() {
            bail!("the replay sensor needs a recording (--replay FILE or sensor.path)");
        }
        let rate = args
            .rate
            .or(config.sensor.rate)
            .map(sampling_rate)
            .unwrap_or_default();
        Ok(Self {
            source,
            recording,
            looping: args.looping || config.sensor.looping,
            rate,
            seed: args.seed.or(config.sensor.seed),
            amplitude: config.sensor.amplitude,
            period: config.sensor.period,
        })
    }

    pub fn build(&self) -> Result<Box<dyn SensorBackend>> {
        let backend: Box<dyn SensorBackend> = match self.source {
            SensorSource::Synthetic => {
                let mut sensor = SyntheticSensor::new();
                if let Some(amplitude) = self.amplitude {
                    sensor = sensor.with_amplitude(amplitude);
                }
                if let Some(period) = self.period {
                    sensor = sensor.with_period(period);
                }
                if let Some(seed) = self.seed {
                    sensor = sensor.with_seed(seed);
                }
                Box::new(sensor)
            }
            SensorSource::Replay => {
                let Some(path) = self.recording.as_ref() else {
                    bail!("the replay sensor needs a recording");
                };
                let sensor = ReplaySensor::from_path(path)
                    .with_context(|| format!("failed to load sensor recording {}", path.display()))?
                    .looping(self.looping);
                Box::new(sensor)
            }
            SensorSource::Stream => Box::new(StreamSensor::stdin()),
            SensorSource::None => Box::new(NullSensor),
        };
        Ok(backend)
    }
}

pub fn smoothing(args: &SourceArgs, config: &BoxConfig) -> SmoothingCoefficient {
    args.smoothing
        .or(config.filter.smoothing)
        .map(SmoothingCoefficient::new)
        .unwrap_or_default()
}

pub fn sampling_rate(setting: RateSetting) -> SamplingRate {
    match setting {
        RateSetting::Fastest => SamplingRate::Fastest,
        RateSetting::Game => SamplingRate::Game,
        RateSetting::Ui => SamplingRate::Ui,
        RateSetting::Normal => SamplingRate::Normal,
        RateSetting::Every(interval) => SamplingRate::Custom(interval),
    }
}

pub fn antialiasing(setting: AntialiasSetting) -> Antialiasing {
    match setting.samples() {
        None => Antialiasing::Auto,
        Some(1) => Antialiasing::Off,
        Some(samples) => Antialiasing::Samples(samples),
    }
}

pub fn color_space(setting: ColorSpaceSetting) -> ColorSpaceMode {
    match setting {
        ColorSpaceSetting::Auto => ColorSpaceMode::Auto,
        ColorSpaceSetting::Gamma => ColorSpaceMode::Gamma,
        ColorSpaceSetting::Linear => ColorSpaceMode::Linear,
    }
}

fn rgb(color: HexColor) -> Rgb {
    Rgb::from_bytes(color.rgb_bytes())
}

/// Starting look: the static preset in static mode, then config overrides.
pub fn visual_params(visual: &VisualSection, colors: &ColorSection, static_mode: bool) -> VisualParams {
    let mut params = if static_mode {
        VisualParams::static_preset()
    } else {
        VisualParams::default()
    };

    let scalars = [
        (&mut params.edge_thickness, visual.edge_thickness),
        (&mut params.rim_intensity, visual.rim_intensity),
        (&mut params.face_brightness, visual.face_brightness),
        (&mut params.ao_strength, visual.ao_strength),
        (&mut params.ao_radius, visual.ao_radius),
        (&mut params.specular_power, visual.specular_power),
        (&mut params.noise_strength, visual.noise_strength),
    ];
    for (slot, value) in scalars {
        if let Some(value) = value {
            *slot = value;
        }
    }

    let palette = [
        (&mut params.neon_line, colors.neon_line),
        (&mut params.highlight, colors.highlight),
        (&mut params.box_color, colors.box_color),
        (&mut params.top.light, colors.top_light),
        (&mut params.top.dark, colors.top_dark),
        (&mut params.bottom.light, colors.bottom_light),
        (&mut params.bottom.dark, colors.bottom_dark),
        (&mut params.left.light, colors.left_light),
        (&mut params.left.dark, colors.left_dark),
        (&mut params.right.light, colors.right_light),
        (&mut params.right.dark, colors.right_dark),
    ];
    for (slot, value) in palette {
        if let Some(color) = value {
            *slot = rgb(color);
        }
    }

    params.clamped()
}

/// Renderer-facing settings merged from flags and config.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSettings {
    pub shader: Option<PathBuf>,
    pub size: (u32, u32),
    pub antialiasing: Antialiasing,
    pub color_space: ColorSpaceMode,
    pub static_mode: bool,
}

impl WindowSettings {
    pub fn resolve(args: &RunArgs, config: &BoxConfig) -> Self {
        let size = args
            .size
            .or(config.render.size.map(|[width, height]| (width, height)))
            .unwrap_or((720, 720));
        Self {
            shader: args.shader.clone().or_else(|| config.render.shader.clone()),
            size,
            antialiasing: args
                .antialias
                .or(config.render.antialias)
                .map(antialiasing)
                .unwrap_or_default(),
            color_space: args
                .color_space
                .or(config.render.color_space)
                .map(color_space)
                .unwrap_or_default(),
            static_mode: args.static_mode || config.render.static_mode,
        }
    }
}
