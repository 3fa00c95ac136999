use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Linear RGB triplet in `[0, 1]`, matching a GLSL `vec3`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Builds a color from a `0xRRGGBB` literal.
    pub fn from_hex(hex: u32) -> Self {
        Self::from_bytes([(hex >> 16) as u8, (hex >> 8) as u8, hex as u8])
    }

    pub fn from_bytes([r, g, b]: [u8; 3]) -> Self {
        Self::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
        )
    }

    pub fn to_bytes(self) -> [u8; 3] {
        let quantise = |channel: f32| (channel.clamp(0.0, 1.0) * 255.0).round() as u8;
        [quantise(self.r), quantise(self.g), quantise(self.b)]
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
    pub fn to_hsv(self) -> (f32, f32, f32) {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let delta = max - min;
        let hue = if delta <= f32::EPSILON {
            0.0
        } else if max == self.r {
            60.0 * ((self.g - self.b) / delta).rem_euclid(6.0)
        } else if max == self.g {
            60.0 * ((self.b - self.r) / delta + 2.0)
        } else {
            60.0 * ((self.r - self.g) / delta + 4.0)
        };
        let saturation = if max <= f32::EPSILON { 0.0 } else { delta / max };
        (hue.rem_euclid(360.0), saturation, max)
    }

    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        let hue = hue.rem_euclid(360.0);
        let chroma = value * saturation;
        let x = chroma * (1.0 - ((hue / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = value - chroma;
        let (r, g, b) = match (hue / 60.0) as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        Self::new(r + m, g + m, b + m)
    }

    /// Replaces the hue, keeping saturation and value.
    pub fn with_hue(self, hue: f32) -> Self {
        let (_, saturation, value) = self.to_hsv();
        Self::from_hsv(hue, saturation, value)
    }

    pub fn rotate_hue(self, degrees: f32) -> Self {
        let (hue, saturation, value) = self.to_hsv();
        Self::from_hsv(hue + degrees, saturation, value)
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b] = self.to_bytes();
        write!(f, "#{r:02X}{g:02X}{b:02X}")
    }
}

/// Per-face shading pair used by the box faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceColors {
    pub light: Rgb,
    pub dark: Rgb,
}

/// Everything the shader reads besides tilt, time and resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualParams {
    pub edge_thickness: f32,
    pub rim_intensity: f32,
    pub face_brightness: f32,
    pub ao_strength: f32,
    pub ao_radius: f32,
    pub specular_power: f32,
    pub noise_strength: f32,
    pub neon_line: Rgb,
    pub highlight: Rgb,
    pub box_color: Rgb,
    pub top: FaceColors,
    pub bottom: FaceColors,
    pub left: FaceColors,
    pub right: FaceColors,
}

impl VisualParams {
    pub const EDGE_THICKNESS_RANGE: RangeInclusive<f32> = 0.0005..=0.1;
    pub const RIM_INTENSITY_RANGE: RangeInclusive<f32> = 0.0..=3.5;
    pub const FACE_BRIGHTNESS_RANGE: RangeInclusive<f32> = 0.1..=3.0;
    pub const AO_STRENGTH_RANGE: RangeInclusive<f32> = 0.0..=1.0;
    pub const AO_RADIUS_RANGE: RangeInclusive<f32> = 0.01..=1.0;
    pub const SPECULAR_POWER_RANGE: RangeInclusive<f32> = 1.0..=256.0;
    pub const NOISE_STRENGTH_RANGE: RangeInclusive<f32> = 0.0..=0.1;

    /// Look of the non-interactive box: thinner edges, brighter rim.
    pub fn static_preset() -> Self {
        Self {
            edge_thickness: 0.002,
            rim_intensity: 1.0,
            ..Self::default()
        }
    }

    /// Pulls every scalar back into its slider range.
    pub fn clamped(mut self) -> Self {
        let clamp = |value: f32, range: RangeInclusive<f32>| {
            if value.is_nan() {
                *range.start()
            } else {
                value.clamp(*range.start(), *range.end())
            }
        };
        self.edge_thickness = clamp(self.edge_thickness, Self::EDGE_THICKNESS_RANGE);
        self.rim_intensity = clamp(self.rim_intensity, Self::RIM_INTENSITY_RANGE);
        self.face_brightness = clamp(self.face_brightness, Self::FACE_BRIGHTNESS_RANGE);
        self.ao_strength = clamp(self.ao_strength, Self::AO_STRENGTH_RANGE);
        self.ao_radius = clamp(self.ao_radius, Self::AO_RADIUS_RANGE);
        self.specular_power = clamp(self.specular_power, Self::SPECULAR_POWER_RANGE);
        self.noise_strength = clamp(self.noise_strength, Self::NOISE_STRENGTH_RANGE);
        self
    }
}

impl Default for VisualParams {
    fn default() -> Self {
        Self {
            edge_thickness: 0.005,
            rim_intensity: 0.5,
            face_brightness: 0.9,
            ao_strength: 0.2,
            ao_radius: 0.3,
            specular_power: 32.0,
            noise_strength: 0.005,
            neon_line: Rgb::from_hex(0x00FFFF),
            highlight: Rgb::from_hex(0xF2F8FF),
            box_color: Rgb::from_hex(0x263359),
            top: FaceColors {
                light: Rgb::from_hex(0xFFA54D),
                dark: Rgb::from_hex(0x995926),
            },
            bottom: FaceColors {
                light: Rgb::from_hex(0x4DE680),
                dark: Rgb::from_hex(0x1A6640),
            },
            left: FaceColors {
                light: Rgb::from_hex(0x66F2FF),
                dark: Rgb::from_hex(0x26738C),
            },
            right: FaceColors {
                light: Rgb::from_hex(0xFF80E6),
                dark: Rgb::from_hex(0x803373),
            },
        }
    }
}

/// Shared, live-editable [`VisualParams`].
///
/// The window's key bindings write here; the uniform binder reads a copy at
/// every draw.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    inner: Arc<RwLock<VisualParams>>,
}

impl ParamStore {
    pub fn new(params: VisualParams) -> Self {
        Self {
            inner: Arc::new(RwLock::new(params.clamped())),
        }
    }

    pub fn get(&self) -> VisualParams {
        match self.inner.read() {
            Ok(params) => *params,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Applies `edit` and re-clamps the result. Returns the stored value.
    pub fn update(&self, edit: impl FnOnce(&mut VisualParams)) -> VisualParams {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = *guard;
        edit(&mut next);
        *guard = next.clamped();
        *guard
    }
}

/// Where the tilt uniform comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiltMode {
    /// Follow the published sensor tilt.
    #[default]
    Live,
    /// Pin tilt at rest and leave the sensor untouched.
    Static,
}

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Gamma-encoded swapchain; shader colors are written as-is.
    #[default]
    Auto,
    Gamma,
    /// sRGB swapchain; shader outputs are treated as linear.
    Linear,
}

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Fragment shader defining `mainImage`.
    pub shader_source: PathBuf,
    pub antialiasing: Antialiasing,
    pub color_space: ColorSpaceMode,
    pub tilt_mode: TiltMode,
    /// Prefix of the window title; live readouts are appended.
    pub title: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (720, 720),
            shader_source: PathBuf::new(),
            antialiasing: Antialiasing::default(),
            color_space: ColorSpaceMode::default(),
            tilt_mode: TiltMode::default(),
            title: "Reactive Box".into(),
        }
    }
}
