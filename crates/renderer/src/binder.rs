//! Draw-time snapshot of everything the fragment shader reads.
//!
//! The binder never blocks: tilt and frame time come from lock-free cells and
//! the visual parameters are copied out of the shared store. A snapshot is
//! taken once per draw, right before the uniform block is written.

use tilt::{CellReader, FrameTime, TiltVector};

use crate::types::{ParamStore, TiltMode, VisualParams};

/// Value of a single shader uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
}

/// Names of every uniform the shader may read, in block order.
pub const UNIFORM_NAMES: [&str; 21] = [
    "uTilt",
    "resolution",
    "uTime",
    "uEdgeThickness",
    "uRimIntensity",
    "uFaceBrightness",
    "uAOStrength",
    "uAORadius",
    "uSpecularPower",
    "uNoiseStrength",
    "uNeonLineColor",
    "uHighlightColor",
    "uColorBox",
    "uColorTopLight",
    "uColorTopDark",
    "uColorBottomLight",
    "uColorBottomDark",
    "uColorLeftLight",
    "uColorLeftDark",
    "uColorRightLight",
    "uColorRightDark",
];

/// Uniform values for one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformSnapshot {
    pub tilt: TiltVector,
    pub resolution: [f32; 2],
    pub time: FrameTime,
    pub params: VisualParams,
}

impl UniformSnapshot {
    /// Values keyed by their shader names, in [`UNIFORM_NAMES`] order.
    pub fn named_values(&self) -> Vec<(&'static str, UniformValue)> {
        use UniformValue::{Float, Vec2, Vec3};
        let p = &self.params;
        let values = [
            Vec2(self.tilt.as_array()),
            Vec2(self.resolution),
            Float(self.time.seconds()),
            Float(p.edge_thickness),
            Float(p.rim_intensity),
            Float(p.face_brightness),
            Float(p.ao_strength),
            Float(p.ao_radius),
            Float(p.specular_power),
            Float(p.noise_strength),
            Vec3(p.neon_line.to_array()),
            Vec3(p.highlight.to_array()),
            Vec3(p.box_color.to_array()),
            Vec3(p.top.light.to_array()),
            Vec3(p.top.dark.to_array()),
            Vec3(p.bottom.light.to_array()),
            Vec3(p.bottom.dark.to_array()),
            Vec3(p.left.light.to_array()),
            Vec3(p.left.dark.to_array()),
            Vec3(p.right.light.to_array()),
            Vec3(p.right.dark.to_array()),
        ];
        UNIFORM_NAMES.into_iter().zip(values).collect()
    }

    pub fn value(&self, name: &str) -> Option<UniformValue> {
        self.named_values()
            .into_iter()
            .find_map(|(candidate, value)| (candidate == name).then_some(value))
    }
}

/// Reads the latest published signals when asked for a snapshot.
#[derive(Debug, Clone)]
pub struct UniformBinder {
    tilt: CellReader<TiltVector>,
    time: CellReader<FrameTime>,
    params: ParamStore,
    mode: TiltMode,
}

impl UniformBinder {
    pub fn new(
        tilt: CellReader<TiltVector>,
        time: CellReader<FrameTime>,
        params: ParamStore,
        mode: TiltMode,
    ) -> Self {
        Self {
            tilt,
            time,
            params,
            mode,
        }
    }

    pub fn mode(&self) -> TiltMode {
        self.mode
    }

    pub fn tilt(&self) -> TiltVector {
        match self.mode {
            TiltMode::Live => self.tilt.get(),
            TiltMode::Static => TiltVector::ZERO,
        }
    }

    pub fn time(&self) -> FrameTime {
        self.time.get()
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Snapshot for a surface of `width x height` physical pixels.
    pub fn snapshot(&self, width: u32, height: u32) -> UniformSnapshot {
        UniformSnapshot {
            tilt: self.tilt(),
            resolution: [width.max(1) as f32, height.max(1) as f32],
            time: self.time(),
            params: self.params.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilt::SignalCell;

    fn binder(mode: TiltMode) -> (SignalCell<TiltVector>, SignalCell<FrameTime>, UniformBinder) {
        let tilt = SignalCell::new(TiltVector::ZERO);
        let time = SignalCell::new(FrameTime::ZERO);
        let binder = UniformBinder::new(tilt.reader(), time.reader(), ParamStore::default(), mode);
        (tilt, time, binder)
    }

    #[test]
    fn snapshot_reads_latest_signals() {
        let (tilt, time, binder) = binder(TiltMode::Live);
        tilt.set(TiltVector::new(0.25, -0.5));
        time.set(FrameTime::from_elapsed(std::time::Duration::from_millis(1250)));
        let snapshot = binder.snapshot(800, 600);
        assert_eq!(snapshot.value("uTilt"), Some(UniformValue::Vec2([0.25, -0.5])));
        assert_eq!(snapshot.value("resolution"), Some(UniformValue::Vec2([800.0, 600.0])));
        assert_eq!(snapshot.value("uTime"), Some(UniformValue::Float(1.25)));
    }

    #[test]
    fn static_mode_pins_tilt_at_rest() {
        let (tilt, _time, binder) = binder(TiltMode::Static);
        tilt.set(TiltVector::new(1.0, 1.0));
        assert_eq!(binder.snapshot(10, 10).tilt, TiltVector::ZERO);
    }

    #[test]
    fn parameter_edits_show_up_in_next_snapshot() {
        let (_tilt, _time, binder) = binder(TiltMode::Live);
        binder.params().update(|params| params.rim_intensity = 2.0);
        assert_eq!(
            binder.snapshot(1, 1).value("uRimIntensity"),
            Some(UniformValue::Float(2.0))
        );
    }

    #[test]
    fn every_contract_name_is_present_once() {
        let (_tilt, _time, binder) = binder(TiltMode::Live);
        let values = binder.snapshot(4, 4).named_values();
        assert_eq!(values.len(), UNIFORM_NAMES.len());
        for name in UNIFORM_NAMES {
            assert_eq!(values.iter().filter(|(n, _)| *n == name).count(), 1, "{name}");
        }
        assert_eq!(
            binder.snapshot(4, 4).value("uNeonLineColor"),
            Some(UniformValue::Vec3([0.0, 1.0, 1.0]))
        );
    }

    #[test]
    fn zero_sized_surface_reports_unit_resolution() {
        let (_tilt, _time, binder) = binder(TiltMode::Live);
        assert_eq!(binder.snapshot(0, 0).resolution, [1.0, 1.0]);
    }
}
