use std::path::Path;

use anyhow::{Context, Result};
use boxconfig::BoxConfig;
use renderer::{
    ParamStore, PreparedShader, Renderer, RendererConfig, SurfaceInputs, TiltMode,
};
use tilt::{FrameClock, TiltController};
use tracing_subscriber::EnvFilter;

use crate::bindings::{self, SensorPlan, WindowSettings};
use crate::cli::RunArgs;
use crate::paths::AppPaths;

pub const BUNDLED_SHADER: &str = include_str!("../shaders/reactive_box.frag");
const BUNDLED_SHADER_NAME: &str = "<bundled>/reactive_box.frag";

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config = load_config(args.source.config.as_deref(), &paths)?;
    let settings = WindowSettings::resolve(&args, &config);
    let plan = SensorPlan::resolve(&args.source, &config)?;

    let controller = TiltController::new(bindings::smoothing(&args.source, &config));
    let params = ParamStore::new(bindings::visual_params(
        &config.visual,
        &config.colors,
        settings.static_mode,
    ));

    let renderer_config = RendererConfig {
        surface_size: settings.size,
        antialiasing: settings.antialiasing,
        color_space: settings.color_space,
        tilt_mode: if settings.static_mode {
            TiltMode::Static
        } else {
            TiltMode::Live
        },
        ..RendererConfig::default()
    };
    let renderer = match settings.shader.clone().or_else(|| paths.user_shader()) {
        Some(shader_source) => Renderer::new(RendererConfig {
            shader_source,
            ..renderer_config
        })
        .context("failed to prepare shader")?,
        None => Renderer::with_shader(renderer_config, bundled_shader()?),
    };

    // Static mode never touches the sensor, so a missing recording is not an error there.
    let sensor = if settings.static_mode {
        None
    } else {
        Some(plan.build()?)
    };

    tracing::info!(
        shader = %renderer.shader().path.display(),
        sensor = ?plan.source,
        rate = %plan.rate,
        smoothing = controller.smoothing_coefficient().get(),
        static_mode = settings.static_mode,
        "starting reactive box"
    );

    renderer.run(SurfaceInputs {
        controller,
        params,
        sensor,
        rate: plan.rate,
        clock: FrameClock::new(),
    })
}

/// Loads `explicit` when given; otherwise the default config file if it exists.
pub fn load_config(explicit: Option<&Path>, paths: &AppPaths) -> Result<BoxConfig> {
    if let Some(path) = explicit {
        return BoxConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    let default_path = paths.config_file();
    if default_path.is_file() {
        return BoxConfig::load(&default_path)
            .with_context(|| format!("failed to load config {}", default_path.display()));
    }
    tracing::debug!(path = %default_path.display(), "no config file; using built-in defaults");
    Ok(BoxConfig::default())
}

pub fn bundled_shader() -> Result<PreparedShader> {
    PreparedShader::from_source(Path::new(BUNDLED_SHADER_NAME), BUNDLED_SHADER)
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_shader_validates() {
        let shader = bundled_shader().unwrap();
        assert!(shader.wrapped.contains("mainImage"));
    }

    #[test]
    fn missing_default_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_raw(dir.path().to_path_buf());
        let config = load_config(None, &paths).unwrap();
        assert_eq!(config.version, 1);
    }

    #[test]
    fn default_config_file_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_raw(dir.path().to_path_buf());
        std::fs::write(paths.config_file(), "[filter]\nsmoothing = 0.6\n").unwrap();
        let config = load_config(None, &paths).unwrap();
        assert_eq!(config.filter.smoothing, Some(0.6));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_raw(dir.path().to_path_buf());
        let missing = dir.path().join("nope.toml");
        let err = load_config(Some(&missing), &paths).unwrap_err();
        assert!(format!("{err:#}").contains("nope.toml"));
    }
}
