use serde::{Deserialize, Serialize};

/// Symmetric bound applied to every tilt axis, in radians.
pub const TILT_LIMIT: f32 = 1.5;

/// Two-axis tilt signal in radians.
///
/// `x` drives the horizontal screen axis and `y` the vertical one. Values
/// leaving the filter are always within `[-TILT_LIMIT, TILT_LIMIT]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TiltVector {
    pub x: f32,
    pub y: f32,
}

impl TiltVector {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Bounds both axes to the tilt range.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_axis(self.x),
            y: clamp_axis(self.y),
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean length of the tilt, in radians.
    pub fn magnitude(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn to_degrees(self) -> (f32, f32) {
        (self.x.to_degrees(), self.y.to_degrees())
    }

    pub fn as_array(self) -> [f32; 2] {
        [self.x, self.y]
    }
}

impl std::ops::Sub for TiltVector {
    type Output = TiltVector;

    fn sub(self, rhs: TiltVector) -> TiltVector {
        TiltVector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// `max(-TILT_LIMIT, min(TILT_LIMIT, value))`.
pub fn clamp_axis(value: f32) -> f32 {
    value.clamp(-TILT_LIMIT, TILT_LIMIT)
}

/// Euler angles extracted from a remapped rotation matrix, in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationAngles {
    pub azimuth: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Sensor-reported confidence in a reading. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    Unreliable,
    Low,
    Medium,
    #[default]
    High,
}

impl Accuracy {
    pub fn is_unreliable(self) -> bool {
        matches!(self, Accuracy::Unreliable)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Accuracy::Unreliable => 0,
            Accuracy::Low => 1,
            Accuracy::Medium => 2,
            Accuracy::High => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Accuracy::Unreliable,
            1 => Accuracy::Low,
            2 => Accuracy::Medium,
            _ => Accuracy::High,
        }
    }
}

/// One rotation-vector reading as delivered by a sensor backend.
///
/// `vector` holds the imaginary quaternion part `(x, y, z) * sin(θ/2)` and,
/// when the platform provides it, the scalar part `cos(θ/2)` in slot 3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawOrientationSample {
    pub vector: [f32; 4],
    pub has_scalar: bool,
    pub accuracy: Accuracy,
}

impl RawOrientationSample {
    /// Builds a sample from the three vector components; the scalar part is
    /// derived when the matrix is computed.
    pub fn from_vector(vector: [f32; 3], accuracy: Accuracy) -> Self {
        Self {
            vector: [vector[0], vector[1], vector[2], 0.0],
            has_scalar: false,
            accuracy,
        }
    }

    pub fn from_quaternion(xyzw: [f32; 4], accuracy: Accuracy) -> Self {
        Self {
            vector: xyzw,
            has_scalar: true,
            accuracy,
        }
    }

    /// Rotation of `angle` radians around a unit `axis`, in device coordinates.
    pub fn from_axis_angle(axis: [f32; 3], angle: f32, accuracy: Accuracy) -> Self {
        let (sin, cos) = (angle * 0.5).sin_cos();
        Self::from_quaternion(
            [axis[0] * sin, axis[1] * sin, axis[2] * sin, cos],
            accuracy,
        )
    }

    pub fn identity() -> Self {
        Self::from_quaternion([0.0, 0.0, 0.0, 1.0], Accuracy::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_bounds_each_axis() {
        let tilt = TiltVector::new(4.0, -9.0).clamped();
        assert_eq!(tilt, TiltVector::new(TILT_LIMIT, -TILT_LIMIT));
        let inside = TiltVector::new(0.3, -1.2).clamped();
        assert_eq!(inside, TiltVector::new(0.3, -1.2));
    }

    #[test]
    fn accuracy_round_trips_through_byte_encoding() {
        for accuracy in [
            Accuracy::Unreliable,
            Accuracy::Low,
            Accuracy::Medium,
            Accuracy::High,
        ] {
            assert_eq!(Accuracy::from_u8(accuracy.as_u8()), accuracy);
        }
    }

    #[test]
    fn axis_angle_sample_is_unit_quaternion() {
        let sample = RawOrientationSample::from_axis_angle([0.0, 1.0, 0.0], 0.8, Accuracy::High);
        let norm: f32 = sample.vector.iter().map(|c| c * c).sum();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!(sample.has_scalar);
    }
}
