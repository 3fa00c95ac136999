//! Window key bindings and the title-bar readout.
//!
//! The window is the only settings surface: every binding maps to one call on
//! [`TiltController`] or one edit of the shared [`ParamStore`]. Scalars and
//! colors are edited through a selection kept in [`ControlState`]: `Tab`
//! picks the scalar that the arrow keys move, `K` picks the color that `H`
//! rotates.

use std::ops::RangeInclusive;

use tilt::{FrameTime, SensorStatus, TiltController, TiltVector};
use tracing::info;
use winit::keyboard::{Key, NamedKey};

use crate::types::{ParamStore, Rgb, VisualParams};

pub const SMOOTHING_STEP: f32 = 0.05;
pub const BRIGHTNESS_STEP: f32 = 0.1;
pub const HUE_STEP_DEGREES: f32 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Calibrate,
    ResetCalibration,
    SmoothingUp,
    SmoothingDown,
    BrightnessUp,
    BrightnessDown,
    NextParameter,
    ParameterUp,
    ParameterDown,
    NextColor,
    RotateHue,
    Quit,
}

/// Scalar parameters reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tunable {
    #[default]
    EdgeThickness,
    RimIntensity,
    FaceBrightness,
    AoStrength,
    AoRadius,
    SpecularPower,
    NoiseStrength,
}

impl Tunable {
    pub const ALL: [Tunable; 7] = [
        Tunable::EdgeThickness,
        Tunable::RimIntensity,
        Tunable::FaceBrightness,
        Tunable::AoStrength,
        Tunable::AoRadius,
        Tunable::SpecularPower,
        Tunable::NoiseStrength,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Tunable::EdgeThickness => "edge",
            Tunable::RimIntensity => "rim",
            Tunable::FaceBrightness => "brightness",
            Tunable::AoStrength => "ao strength",
            Tunable::AoRadius => "ao radius",
            Tunable::SpecularPower => "specular",
            Tunable::NoiseStrength => "noise",
        }
    }

    pub fn range(self) -> RangeInclusive<f32> {
        match self {
            Tunable::EdgeThickness => VisualParams::EDGE_THICKNESS_RANGE,
            Tunable::RimIntensity => VisualParams::RIM_INTENSITY_RANGE,
            Tunable::FaceBrightness => VisualParams::FACE_BRIGHTNESS_RANGE,
            Tunable::AoStrength => VisualParams::AO_STRENGTH_RANGE,
            Tunable::AoRadius => VisualParams::AO_RADIUS_RANGE,
            Tunable::SpecularPower => VisualParams::SPECULAR_POWER_RANGE,
            Tunable::NoiseStrength => VisualParams::NOISE_STRENGTH_RANGE,
        }
    }

    pub fn step(self) -> f32 {
        match self {
            Tunable::EdgeThickness => 0.001,
            Tunable::RimIntensity => 0.1,
            Tunable::FaceBrightness => BRIGHTNESS_STEP,
            Tunable::AoStrength => 0.05,
            Tunable::AoRadius => 0.05,
            Tunable::SpecularPower => 4.0,
            Tunable::NoiseStrength => 0.005,
        }
    }

    pub fn value(self, params: &VisualParams) -> f32 {
        let mut copy = *params;
        *self.slot(&mut copy)
    }

    fn slot(self, params: &mut VisualParams) -> &mut f32 {
        match self {
            Tunable::EdgeThickness => &mut params.edge_thickness,
            Tunable::RimIntensity => &mut params.rim_intensity,
            Tunable::FaceBrightness => &mut params.face_brightness,
            Tunable::AoStrength => &mut params.ao_strength,
            Tunable::AoRadius => &mut params.ao_radius,
            Tunable::SpecularPower => &mut params.specular_power,
            Tunable::NoiseStrength => &mut params.noise_strength,
        }
    }

    fn next(self) -> Self {
        let index = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

/// Colors whose hue can be rotated: the neon line, the highlight and the
/// nine face colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorTarget {
    #[default]
    NeonLine,
    Highlight,
    Box,
    TopLight,
    TopDark,
    BottomLight,
    BottomDark,
    LeftLight,
    LeftDark,
    RightLight,
    RightDark,
}

impl ColorTarget {
    pub const ALL: [ColorTarget; 11] = [
        ColorTarget::NeonLine,
        ColorTarget::Highlight,
        ColorTarget::Box,
        ColorTarget::TopLight,
        ColorTarget::TopDark,
        ColorTarget::BottomLight,
        ColorTarget::BottomDark,
        ColorTarget::LeftLight,
        ColorTarget::LeftDark,
        ColorTarget::RightLight,
        ColorTarget::RightDark,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ColorTarget::NeonLine => "neon",
            ColorTarget::Highlight => "highlight",
            ColorTarget::Box => "box",
            ColorTarget::TopLight => "top light",
            ColorTarget::TopDark => "top dark",
            ColorTarget::BottomLight => "bottom light",
            ColorTarget::BottomDark => "bottom dark",
            ColorTarget::LeftLight => "left light",
            ColorTarget::LeftDark => "left dark",
            ColorTarget::RightLight => "right light",
            ColorTarget::RightDark => "right dark",
        }
    }

    pub fn color(self, params: &VisualParams) -> Rgb {
        let mut copy = *params;
        *self.slot(&mut copy)
    }

    fn slot(self, params: &mut VisualParams) -> &mut Rgb {
        match self {
            ColorTarget::NeonLine => &mut params.neon_line,
            ColorTarget::Highlight => &mut params.highlight,
            ColorTarget::Box => &mut params.box_color,
            ColorTarget::TopLight => &mut params.top.light,
            ColorTarget::TopDark => &mut params.top.dark,
            ColorTarget::BottomLight => &mut params.bottom.light,
            ColorTarget::BottomDark => &mut params.bottom.dark,
            ColorTarget::LeftLight => &mut params.left.light,
            ColorTarget::LeftDark => &mut params.left.dark,
            ColorTarget::RightLight => &mut params.right.light,
            ColorTarget::RightDark => &mut params.right.dark,
        }
    }

    fn next(self) -> Self {
        let index = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

/// Current keyboard selection; lives as long as the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub parameter: Tunable,
    pub color: ColorTarget,
}

impl ControlState {
    /// Selection readout appended to the window title.
    pub fn describe(&self, params: &VisualParams) -> String {
        format!(
            "{} {:.4} | hue {}",
            self.parameter.label(),
            self.parameter.value(params),
            self.color.label()
        )
    }
}

/// Maps a logical key to its binding. Letter keys ignore case.
pub fn key_action(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        Key::Named(NamedKey::Tab) => Some(KeyAction::NextParameter),
        Key::Named(NamedKey::ArrowUp) => Some(KeyAction::ParameterUp),
        Key::Named(NamedKey::ArrowDown) => Some(KeyAction::ParameterDown),
        Key::Character(value) => match value.to_ascii_lowercase().as_str() {
            "c" => Some(KeyAction::Calibrate),
            "z" => Some(KeyAction::ResetCalibration),
            "=" | "+" => Some(KeyAction::SmoothingUp),
            "-" | "_" => Some(KeyAction::SmoothingDown),
            "]" => Some(KeyAction::BrightnessUp),
            "[" => Some(KeyAction::BrightnessDown),
            "." | ">" => Some(KeyAction::ParameterUp),
            "," | "<" => Some(KeyAction::ParameterDown),
            "k" => Some(KeyAction::NextColor),
            "h" => Some(KeyAction::RotateHue),
            _ => None,
        },
        _ => None,
    }
}

fn nudge(params: &ParamStore, tunable: Tunable, direction: f32) -> f32 {
    let updated = params.update(|p| *tunable.slot(p) += tunable.step() * direction);
    let value = tunable.value(&updated);
    info!(
        parameter = tunable.label(),
        value,
        range = ?tunable.range(),
        "visual parameter changed"
    );
    value
}

/// Applies a binding. `Quit` is left to the event loop.
pub fn apply(
    action: KeyAction,
    state: &mut ControlState,
    controller: &TiltController,
    params: &ParamStore,
) {
    match action {
        KeyAction::Calibrate => controller.calibrate(),
        KeyAction::ResetCalibration => controller.reset_calibration(),
        KeyAction::SmoothingUp | KeyAction::SmoothingDown => {
            let step = if action == KeyAction::SmoothingUp {
                SMOOTHING_STEP
            } else {
                -SMOOTHING_STEP
            };
            let current = controller.smoothing_coefficient().get();
            let applied = controller.set_smoothing_coefficient(current + step);
            info!(coefficient = applied.get(), "smoothing coefficient changed");
        }
        KeyAction::BrightnessUp => {
            nudge(params, Tunable::FaceBrightness, 1.0);
        }
        KeyAction::BrightnessDown => {
            nudge(params, Tunable::FaceBrightness, -1.0);
        }
        KeyAction::NextParameter => {
            state.parameter = state.parameter.next();
            info!(parameter = state.parameter.label(), "parameter selected");
        }
        KeyAction::ParameterUp => {
            nudge(params, state.parameter, 1.0);
        }
        KeyAction::ParameterDown => {
            nudge(params, state.parameter, -1.0);
        }
        KeyAction::NextColor => {
            state.color = state.color.next();
            info!(color = state.color.label(), "color selected");
        }
        KeyAction::RotateHue => {
            let target = state.color;
            let updated = params.update(|p| {
                let slot = target.slot(p);
                *slot = slot.rotate_hue(HUE_STEP_DEGREES);
            });
            info!(color = target.label(), value = %target.color(&updated), "color hue rotated");
        }
        KeyAction::Quit => {}
    }
}

/// Title text doubling as the debug overlay.
pub fn overlay_title(prefix: &str, tilt: TiltVector, time: FrameTime, status: SensorStatus) -> String {
    let sensor = match status {
        SensorStatus::Active => "",
        SensorStatus::Inactive => " | sensor off",
        SensorStatus::Unavailable => " | no sensor",
    };
    format!(
        "{prefix} | tilt X {:+.2} Y {:+.2} | t {time}{sensor}",
        tilt.x, tilt.y
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FaceColors;
    use tilt::SmoothingCoefficient;

    fn character(value: &str) -> Key {
        Key::Character(value.into())
    }

    fn press(action: KeyAction, times: usize, state: &mut ControlState, params: &ParamStore) {
        let controller = TiltController::default();
        for _ in 0..times {
            apply(action, state, &controller, params);
        }
    }

    fn approx(a: f32, b: f32, tolerance: f32) {
        assert!((a - b).abs() < tolerance, "{a} != {b}");
    }

    #[test]
    fn bindings_cover_documented_keys() {
        assert_eq!(key_action(&character("c")), Some(KeyAction::Calibrate));
        assert_eq!(key_action(&character("C")), Some(KeyAction::Calibrate));
        assert_eq!(key_action(&character("z")), Some(KeyAction::ResetCalibration));
        assert_eq!(key_action(&character("=")), Some(KeyAction::SmoothingUp));
        assert_eq!(key_action(&character("-")), Some(KeyAction::SmoothingDown));
        assert_eq!(key_action(&character("]")), Some(KeyAction::BrightnessUp));
        assert_eq!(key_action(&character("[")), Some(KeyAction::BrightnessDown));
        assert_eq!(key_action(&character(".")), Some(KeyAction::ParameterUp));
        assert_eq!(key_action(&character(",")), Some(KeyAction::ParameterDown));
        assert_eq!(key_action(&character("K")), Some(KeyAction::NextColor));
        assert_eq!(key_action(&character("h")), Some(KeyAction::RotateHue));
        assert_eq!(key_action(&Key::Named(NamedKey::Tab)), Some(KeyAction::NextParameter));
        assert_eq!(key_action(&Key::Named(NamedKey::ArrowUp)), Some(KeyAction::ParameterUp));
        assert_eq!(
            key_action(&Key::Named(NamedKey::ArrowDown)),
            Some(KeyAction::ParameterDown)
        );
        assert_eq!(key_action(&Key::Named(NamedKey::Escape)), Some(KeyAction::Quit));
        assert_eq!(key_action(&character("q")), None);
        assert_eq!(key_action(&Key::Named(NamedKey::Space)), None);
    }

    #[test]
    fn smoothing_steps_stay_in_range() {
        let mut state = ControlState::default();
        let controller = TiltController::new(SmoothingCoefficient::new(0.98));
        let params = ParamStore::default();
        apply(KeyAction::SmoothingUp, &mut state, &controller, &params);
        assert_eq!(controller.smoothing_coefficient().get(), 1.0);

        let controller = TiltController::new(SmoothingCoefficient::new(0.2));
        for _ in 0..10 {
            apply(KeyAction::SmoothingDown, &mut state, &controller, &params);
        }
        assert_eq!(controller.smoothing_coefficient().get(), SmoothingCoefficient::MIN);
    }

    #[test]
    fn brightness_steps_clamp_to_slider_range() {
        let mut state = ControlState::default();
        let params = ParamStore::default();
        press(KeyAction::BrightnessUp, 40, &mut state, &params);
        assert_eq!(params.get().face_brightness, 3.0);
        press(KeyAction::BrightnessDown, 40, &mut state, &params);
        assert_eq!(params.get().face_brightness, 0.1);
    }

    #[test]
    fn tab_cycles_through_every_parameter() {
        let mut state = ControlState::default();
        let params = ParamStore::default();
        for expected in Tunable::ALL.iter().skip(1) {
            press(KeyAction::NextParameter, 1, &mut state, &params);
            assert_eq!(state.parameter, *expected);
        }
        press(KeyAction::NextParameter, 1, &mut state, &params);
        assert_eq!(state.parameter, Tunable::EdgeThickness);
    }

    #[test]
    fn every_parameter_clamps_at_both_ends() {
        for tunable in Tunable::ALL {
            let mut state = ControlState {
                parameter: tunable,
                ..ControlState::default()
            };
            let params = ParamStore::default();
            let range = tunable.range();
            let presses = ((range.end() - range.start()) / tunable.step()).ceil() as usize + 5;

            press(KeyAction::ParameterUp, presses, &mut state, &params);
            assert_eq!(tunable.value(&params.get()), *range.end(), "{tunable:?} upper");
            press(KeyAction::ParameterDown, presses, &mut state, &params);
            assert_eq!(tunable.value(&params.get()), *range.start(), "{tunable:?} lower");
        }
    }

    #[test]
    fn parameter_keys_only_touch_the_selection() {
        let mut state = ControlState {
            parameter: Tunable::AoRadius,
            ..ControlState::default()
        };
        let params = ParamStore::default();
        press(KeyAction::ParameterUp, 1, &mut state, &params);
        let edited = params.get();
        let defaults = VisualParams::default();
        approx(edited.ao_radius, defaults.ao_radius + 0.05, 1e-6);
        assert_eq!(edited.edge_thickness, defaults.edge_thickness);
        assert_eq!(edited.rim_intensity, defaults.rim_intensity);
        assert_eq!(edited.ao_strength, defaults.ao_strength);
    }

    #[test]
    fn hue_rotation_reaches_every_color() {
        let base = Rgb::from_hsv(100.0, 0.8, 0.6);
        let faces = FaceColors {
            light: base,
            dark: base,
        };
        let palette = VisualParams {
            neon_line: base,
            highlight: base,
            box_color: base,
            top: faces,
            bottom: faces,
            left: faces,
            right: faces,
            ..VisualParams::default()
        };

        let mut state = ControlState::default();
        for (index, target) in ColorTarget::ALL.into_iter().enumerate() {
            if index > 0 {
                let params = ParamStore::default();
                press(KeyAction::NextColor, 1, &mut state, &params);
            }
            assert_eq!(state.color, target);

            let params = ParamStore::new(palette);
            press(KeyAction::RotateHue, 1, &mut state, &params);
            let edited = params.get();
            let (hue, saturation, value) = target.color(&edited).to_hsv();
            approx(hue, 115.0, 0.5);
            approx(saturation, 0.8, 1e-3);
            approx(value, 0.6, 1e-3);
            for other in ColorTarget::ALL.into_iter().filter(|c| *c != target) {
                assert_eq!(other.color(&edited), base, "{other:?} changed with {target:?}");
            }
        }
        press(KeyAction::NextColor, 1, &mut state, &ParamStore::default());
        assert_eq!(state.color, ColorTarget::NeonLine);
    }

    #[test]
    fn calibrate_and_reset_reach_the_controller() {
        let mut state = ControlState::default();
        let controller = TiltController::default();
        let params = ParamStore::default();
        controller.publish_raw(TiltVector::new(0.3, -0.2));
        apply(KeyAction::Calibrate, &mut state, &controller, &params);
        assert_eq!(controller.tilt(), TiltVector::ZERO);
        apply(KeyAction::ResetCalibration, &mut state, &controller, &params);
        assert_eq!(controller.tilt(), TiltVector::new(0.3, -0.2));
    }

    #[test]
    fn selection_readout_names_parameter_and_color() {
        let state = ControlState {
            parameter: Tunable::RimIntensity,
            color: ColorTarget::LeftDark,
        };
        assert_eq!(
            state.describe(&VisualParams::default()),
            "rim 0.5000 | hue left dark"
        );
    }

    #[test]
    fn overlay_shows_tilt_time_and_missing_sensor() {
        let title = overlay_title(
            "Reactive Box",
            TiltVector::new(0.25, -0.5),
            FrameTime::from_elapsed(std::time::Duration::from_millis(1500)),
            SensorStatus::Unavailable,
        );
        assert_eq!(title, "Reactive Box | tilt X +0.25 Y -0.50 | t 1.50s | no sensor");
    }
}
