//! `reactibox.toml`: startup configuration for the reactive box.
//!
//! Every section is optional; an empty file (or `version = 1` alone) yields
//! the built-in look with the synthetic sensor. The file is read once at
//! startup and never written back.

use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

pub const CONFIG_FILE_NAME: &str = "reactibox.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BoxConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub filter: FilterSection,
    #[serde(default)]
    pub sensor: SensorSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub visual: VisualSection,
    #[serde(default)]
    pub colors: ColorSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSection {
    /// Low-pass blend factor. Out-of-range values are clamped by the filter,
    /// but the config rejects them so typos surface early.
    pub smoothing: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorSource {
    #[default]
    Synthetic,
    Replay,
    Stream,
    None,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SensorSection {
    #[serde(default)]
    pub source: SensorSource,
    /// Recording played back by the `replay` source.
    pub path: Option<PathBuf>,
    #[serde(default, deserialize_with = "deserialize_rate_opt")]
    pub rate: Option<RateSetting>,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    /// Seed for the synthetic source's jitter.
    pub seed: Option<u64>,
    /// Peak wobble of the synthetic source, in radians.
    pub amplitude: Option<f32>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub period: Option<Duration>,
}

/// Sensor delivery-rate hint: a named preset or an explicit interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSetting {
    Fastest,
    Game,
    Ui,
    Normal,
    Every(Duration),
}

impl fmt::Display for RateSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateSetting::Fastest => f.write_str("fastest"),
            RateSetting::Game => f.write_str("game"),
            RateSetting::Ui => f.write_str("ui"),
            RateSetting::Normal => f.write_str("normal"),
            RateSetting::Every(interval) => {
                write!(f, "{}", humantime::format_duration(*interval))
            }
        }
    }
}

impl Serialize for RateSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpaceSetting {
    Auto,
    Gamma,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples2,
    Samples4,
    Samples8,
    Samples16,
}

impl AntialiasSetting {
    pub fn samples(self) -> Option<u32> {
        match self {
            AntialiasSetting::Auto => None,
            AntialiasSetting::Off => Some(1),
            AntialiasSetting::Samples2 => Some(2),
            AntialiasSetting::Samples4 => Some(4),
            AntialiasSetting::Samples8 => Some(8),
            AntialiasSetting::Samples16 => Some(16),
        }
    }
}

impl std::str::FromStr for AntialiasSetting {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" | "max" => Ok(AntialiasSetting::Auto),
            "off" | "none" | "0" | "1" => Ok(AntialiasSetting::Off),
            "2" => Ok(AntialiasSetting::Samples2),
            "4" => Ok(AntialiasSetting::Samples4),
            "8" => Ok(AntialiasSetting::Samples8),
            "16" => Ok(AntialiasSetting::Samples16),
            other => Err(format!(
                "invalid antialias setting '{other}' (expected auto, off, 2, 4, 8 or 16)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RenderSection {
    /// Fragment shader path; relative paths resolve against the config file.
    pub shader: Option<PathBuf>,
    /// Initial window size as `[width, height]`.
    pub size: Option<[u32; 2]>,
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
    pub color_space: Option<ColorSpaceSetting>,
    /// Pin tilt at rest and skip the sensor.
    #[serde(default, rename = "static")]
    pub static_mode: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VisualSection {
    pub edge_thickness: Option<f32>,
    pub rim_intensity: Option<f32>,
    pub face_brightness: Option<f32>,
    pub ao_strength: Option<f32>,
    pub ao_radius: Option<f32>,
    pub specular_power: Option<f32>,
    pub noise_strength: Option<f32>,
}

impl VisualSection {
    pub const EDGE_THICKNESS: RangeInclusive<f32> = 0.0005..=0.1;
    pub const RIM_INTENSITY: RangeInclusive<f32> = 0.0..=3.5;
    pub const FACE_BRIGHTNESS: RangeInclusive<f32> = 0.1..=3.0;
    pub const AO_STRENGTH: RangeInclusive<f32> = 0.0..=1.0;
    pub const AO_RADIUS: RangeInclusive<f32> = 0.01..=1.0;
    pub const SPECULAR_POWER: RangeInclusive<f32> = 1.0..=256.0;
    pub const NOISE_STRENGTH: RangeInclusive<f32> = 0.0..=0.1;

    fn checks(&self) -> [(&'static str, Option<f32>, RangeInclusive<f32>); 7] {
        [
            ("edge_thickness", self.edge_thickness, Self::EDGE_THICKNESS),
            ("rim_intensity", self.rim_intensity, Self::RIM_INTENSITY),
            ("face_brightness", self.face_brightness, Self::FACE_BRIGHTNESS),
            ("ao_strength", self.ao_strength, Self::AO_STRENGTH),
            ("ao_radius", self.ao_radius, Self::AO_RADIUS),
            ("specular_power", self.specular_power, Self::SPECULAR_POWER),
            ("noise_strength", self.noise_strength, Self::NOISE_STRENGTH),
        ]
    }
}

/// `#RRGGBB` color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(pub u32);

impl HexColor {
    pub fn rgb_bytes(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }
}

impl std::str::FromStr for HexColor {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let digits = raw.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(format!("invalid color '{raw}'; expected #RRGGBB"));
        }
        u32::from_str_radix(digits, 16)
            .map(HexColor)
            .map_err(|err| format!("invalid color '{raw}': {err}"))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ColorSection {
    pub neon_line: Option<HexColor>,
    pub highlight: Option<HexColor>,
    #[serde(rename = "box")]
    pub box_color: Option<HexColor>,
    pub top_light: Option<HexColor>,
    pub top_dark: Option<HexColor>,
    pub bottom_light: Option<HexColor>,
    pub bottom_dark: Option<HexColor>,
    pub left_light: Option<HexColor>,
    pub left_dark: Option<HexColor>,
    pub right_light: Option<HexColor>,
    pub right_dark: Option<HexColor>,
}

fn default_version() -> u32 {
    1
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            filter: FilterSection::default(),
            sensor: SensorSection::default(),
            render: RenderSection::default(),
            visual: VisualSection::default(),
            colors: ColorSection::default(),
        }
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Text(String),
        Seconds(f64),
    }

    match Option::<Helper>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Helper::Text(raw)) => humantime::parse_duration(raw.trim())
            .map(Some)
            .map_err(|err| de::Error::custom(format!("invalid duration '{raw}': {err}"))),
        Some(Helper::Seconds(value)) => {
            if value.is_nan() || value.is_sign_negative() || value.is_infinite() {
                return Err(de::Error::custom("duration must be a non-negative number of seconds"));
            }
            Ok(Some(Duration::from_secs_f64(value)))
        }
    }
}

fn deserialize_rate_opt<'de, D>(deserializer: D) -> Result<Option<RateSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<RateSetting>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a rate preset, a human-readable interval or milliseconds")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_rate(v).map(Some).map_err(E::custom)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(RateSetting::Every(Duration::from_millis(v))))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("sensor rate must be non-negative"));
            }
            Ok(Some(RateSetting::Every(Duration::from_millis(v as u64))))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Parses `fastest`, `game`, `ui`, `normal` or a humantime interval such as `15ms`.
pub fn parse_rate(raw: &str) -> Result<RateSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "fastest" => Ok(RateSetting::Fastest),
        "game" => Ok(RateSetting::Game),
        "ui" => Ok(RateSetting::Ui),
        "normal" => Ok(RateSetting::Normal),
        other => humantime::parse_duration(other)
            .map(RateSetting::Every)
            .map_err(|err| format!("invalid sensor rate '{raw}': {err}")),
    }
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    match Option::<Helper>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Helper::Str(raw)) => raw.parse().map(Some).map_err(de::Error::custom),
        Some(Helper::Num(value)) if value < 0 => {
            Err(de::Error::custom("antialias sample count must be non-negative"))
        }
        Some(Helper::Num(value)) => value
            .to_string()
            .parse()
            .map(Some)
            .map_err(de::Error::custom),
    }
}

impl BoxConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: BoxConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates `path`. Relative paths inside the file are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }
        Ok(config)
    }

    pub fn resolve_relative_paths(&mut self, base: &Path) {
        for slot in [&mut self.render.shader, &mut self.sensor.path] {
            if let Some(path) = slot.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(smoothing) = self.filter.smoothing {
            if !(0.01..=1.0).contains(&smoothing) {
                return Err(ConfigError::Invalid(format!(
                    "filter.smoothing must be within [0.01, 1.0], got {smoothing}"
                )));
            }
        }

        if self.sensor.source == SensorSource::Replay && self.sensor.path.is_none() {
            return Err(ConfigError::Invalid(
                "sensor.source = \"replay\" requires sensor.path".into(),
            ));
        }

        if let Some(RateSetting::Every(interval)) = self.sensor.rate {
            if interval < Duration::from_millis(1) {
                return Err(ConfigError::Invalid(
                    "sensor.rate must be at least 1ms".into(),
                ));
            }
        }

        if let Some(amplitude) = self.sensor.amplitude {
            if !(0.0..=1.5).contains(&amplitude) {
                return Err(ConfigError::Invalid(format!(
                    "sensor.amplitude must be within [0, 1.5], got {amplitude}"
                )));
            }
        }

        if let Some(period) = self.sensor.period {
            if period.is_zero() {
                return Err(ConfigError::Invalid(
                    "sensor.period must be greater than zero".into(),
                ));
            }
        }

        if let Some([width, height]) = self.render.size {
            if width == 0 || height == 0 {
                return Err(ConfigError::Invalid(
                    "render.size must be non-zero in both dimensions".into(),
                ));
            }
        }

        for (name, value, range) in self.visual.checks() {
            if let Some(value) = value {
                if !range.contains(&value) {
                    return Err(ConfigError::Invalid(format!(
                        "visual.{name} must be within [{}, {}], got {value}",
                        range.start(),
                        range.end()
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
version = 1

[filter]
smoothing = 0.35

[sensor]
source = "replay"
path = "walk.jsonl"
rate = "ui"
loop = true

[render]
shader = "shaders/box.frag"
size = [1024, 768]
antialias = 4
color_space = "linear"

[visual]
edge_thickness = 0.002
rim_intensity = 1.0
face_brightness = 1.2

[colors]
neon_line = "#FF00FF"
box = "263359"
"##;

    #[test]
    fn parses_sample_config() {
        let config = BoxConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.filter.smoothing, Some(0.35));
        assert_eq!(config.sensor.source, SensorSource::Replay);
        assert_eq!(config.sensor.rate, Some(RateSetting::Ui));
        assert!(config.sensor.looping);
        assert_eq!(config.render.size, Some([1024, 768]));
        assert_eq!(config.render.antialias, Some(AntialiasSetting::Samples4));
        assert_eq!(config.render.color_space, Some(ColorSpaceSetting::Linear));
        assert!(!config.render.static_mode);
        assert_eq!(config.visual.face_brightness, Some(1.2));
        assert_eq!(config.colors.neon_line, Some(HexColor(0xFF00FF)));
        assert_eq!(config.colors.box_color.map(HexColor::rgb_bytes), Some([0x26, 0x33, 0x59]));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = BoxConfig::from_toml_str("").unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.sensor.source, SensorSource::Synthetic);
        assert!(config.sensor.rate.is_none());
        assert!(config.filter.smoothing.is_none());
    }

    #[test]
    fn default_config_is_valid() {
        BoxConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_unknown_version() {
        let err = BoxConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_slider_values() {
        let err = BoxConfig::from_toml_str("[visual]\nrim_intensity = 4.0\n").unwrap_err();
        assert!(err.to_string().contains("visual.rim_intensity"));

        let err = BoxConfig::from_toml_str("[visual]\nedge_thickness = 0.0001\n").unwrap_err();
        assert!(err.to_string().contains("visual.edge_thickness"));

        let err = BoxConfig::from_toml_str("[filter]\nsmoothing = 0\n").unwrap_err();
        assert!(err.to_string().contains("filter.smoothing"));
    }

    #[test]
    fn replay_requires_a_recording() {
        let err = BoxConfig::from_toml_str("[sensor]\nsource = \"replay\"\n").unwrap_err();
        assert!(err.to_string().contains("sensor.path"));
    }

    #[test]
    fn rate_accepts_presets_intervals_and_milliseconds() {
        assert_eq!(parse_rate("Fastest").unwrap(), RateSetting::Fastest);
        assert_eq!(
            parse_rate("15ms").unwrap(),
            RateSetting::Every(Duration::from_millis(15))
        );
        assert!(parse_rate("often").is_err());

        let config = BoxConfig::from_toml_str("[sensor]\nrate = 40\n").unwrap();
        assert_eq!(
            config.sensor.rate,
            Some(RateSetting::Every(Duration::from_millis(40)))
        );
        let err = BoxConfig::from_toml_str("[sensor]\nrate = \"0ms\"\n").unwrap_err();
        assert!(err.to_string().contains("at least 1ms"));
    }

    #[test]
    fn synthetic_period_accepts_seconds_or_text() {
        let config = BoxConfig::from_toml_str("[sensor]\nperiod = \"4s\"\n").unwrap();
        assert_eq!(config.sensor.period, Some(Duration::from_secs(4)));
        let config = BoxConfig::from_toml_str("[sensor]\nperiod = 2.5\n").unwrap();
        assert_eq!(config.sensor.period, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn rejects_malformed_colors_and_unknown_keys() {
        let err = BoxConfig::from_toml_str("[colors]\nneon_line = \"#GG0000\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = BoxConfig::from_toml_str("[visual]\nglow = 1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn static_flag_and_antialias_strings() {
        let config =
            BoxConfig::from_toml_str("[render]\nstatic = true\nantialias = \"off\"\n").unwrap();
        assert!(config.render.static_mode);
        assert_eq!(config.render.antialias, Some(AntialiasSetting::Off));
        assert_eq!(AntialiasSetting::Off.samples(), Some(1));
        assert!("3".parse::<AntialiasSetting>().is_err());
    }

    #[test]
    fn load_resolves_paths_next_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, SAMPLE).unwrap();

        let config = BoxConfig::load(&path).unwrap();
        assert_eq!(config.sensor.path, Some(dir.path().join("walk.jsonl")));
        assert_eq!(config.render.shader, Some(dir.path().join("shaders/box.frag")));

        let err = BoxConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
