use std::path::PathBuf;

use boxconfig::{parse_rate, AntialiasSetting, ColorSpaceSetting, RateSetting, SensorSource};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "reactibox",
    author,
    version,
    about = "Tilt-driven reactive box",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the tilt signal without opening a window.
    Debug(DebugArgs),
    /// Print the resolved configuration file and shader locations.
    Where(SourceArgs),
}

/// Options shared by every command that drives the sensor pipeline.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Configuration file (defaults to `reactibox.toml` in the config directory).
    #[arg(long, value_name = "FILE", env = "REACTIBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Orientation source: `synthetic`, `replay`, `stream` (JSON lines on stdin) or `none`.
    #[arg(long, value_name = "SOURCE", value_parser = parse_sensor_source)]
    pub sensor: Option<SensorSource>,

    /// Replay a JSON-lines sensor recording (implies `--sensor replay`).
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Restart the recording when it ends.
    #[arg(long = "loop")]
    pub looping: bool,

    /// Sensor rate hint: `fastest`, `game`, `ui`, `normal` or an interval such as `15ms`.
    #[arg(long, value_name = "RATE", value_parser = parse_rate)]
    pub rate: Option<RateSetting>,

    /// Seed for the synthetic sensor's jitter.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Smoothing coefficient in [0.01, 1.0]; larger follows the sensor more closely.
    #[arg(long, value_name = "COEFFICIENT")]
    pub smoothing: Option<f32>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Fragment shader defining `mainImage` (defaults to the bundled reactive box).
    #[arg(long, value_name = "FILE", env = "REACTIBOX_SHADER")]
    pub shader: Option<PathBuf>,

    /// Initial window size (e.g. `720x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<AntialiasSetting>,

    /// Output color space handling: `auto`, `gamma`, or `linear`.
    #[arg(long, value_name = "MODE", value_parser = parse_color_space)]
    pub color_space: Option<ColorSpaceSetting>,

    /// Keep the box at rest and leave the sensor off.
    #[arg(long = "static")]
    pub static_mode: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DebugArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Number of readout lines to print before exiting.
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub frames: u64,

    /// Readout cadence in lines per second.
    #[arg(long, value_name = "HZ", default_value_t = 10.0)]
    pub hz: f32,

    /// Print one JSON object per line instead of text.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_sensor_source(value: &str) -> Result<SensorSource, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "synthetic" | "demo" => Ok(SensorSource::Synthetic),
        "replay" => Ok(SensorSource::Replay),
        "stream" | "stdin" => Ok(SensorSource::Stream),
        "none" | "off" => Ok(SensorSource::None),
        other => Err(format!(
            "unknown sensor source '{other}'; expected synthetic, replay, stream, or none"
        )),
    }
}

pub fn parse_antialias(value: &str) -> Result<AntialiasSetting, String> {
    if value.trim().is_empty() {
        return Err("anti-alias mode must not be empty".to_string());
    }
    value.parse()
}

pub fn parse_color_space(value: &str) -> Result<ColorSpaceSetting, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("color space must not be empty".to_string());
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "auto" => Ok(ColorSpaceSetting::Auto),
        "gamma" | "srgb-off" => Ok(ColorSpaceSetting::Gamma),
        "linear" | "srgb" => Ok(ColorSpaceSetting::Linear),
        other => Err(format!(
            "unknown color space '{other}'; expected auto, gamma, or linear"
        )),
    }
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{w}'"))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err("window size must be greater than zero".into());
    }
    Ok((width, height))
}
