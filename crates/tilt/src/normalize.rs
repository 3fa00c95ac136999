//! Rotation vector → screen-relative tilt.
//!
//! The pipeline mirrors the usual mobile sensor stack:
//!
//! ```text
//!   rotation vector ──▶ 3x3 rotation matrix ──▶ axis remap ──▶ (azimuth, pitch, roll)
//!                                                                   │
//!                                            x = -pitch, y = roll ◀─┘
//! ```
//!
//! The remap is a fixed constant ([`SCREEN_REMAP`]): device Y becomes the
//! world-facing X axis and device -X becomes Y. With that choice, tilting the
//! right edge of the device down moves the visual to the right, and tilting
//! the top edge towards the viewer moves it up.

use crate::types::{OrientationAngles, RawOrientationSample, TiltVector};

/// Row-major 3x3 rotation matrix.
pub type RotationMatrix = [f32; 9];

/// Device axis selector used when remapping a rotation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
    MinusX,
    MinusY,
    MinusZ,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X | Axis::MinusX => 0,
            Axis::Y | Axis::MinusY => 1,
            Axis::Z | Axis::MinusZ => 2,
        }
    }

    fn is_negative(self) -> bool {
        matches!(self, Axis::MinusX | Axis::MinusY | Axis::MinusZ)
    }
}

/// Where the world X and Y axes are taken from in device coordinates. The Z
/// axis is implied and chosen so the result stays right-handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRemap {
    pub x: Axis,
    pub y: Axis,
}

/// The one remap used for the screen: X ← device Y, Y ← device -X.
pub const SCREEN_REMAP: AxisRemap = AxisRemap {
    x: Axis::Y,
    y: Axis::MinusX,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RemapError {
    #[error("remap assigns {0:?} and {1:?} to the same device axis")]
    SameAxis(Axis, Axis),
}

/// Converts a rotation vector into a rotation matrix.
///
/// When the sample carries no scalar component it is reconstructed from the
/// vector length, saturating at zero for slightly denormalised input.
pub fn rotation_matrix_from_vector(sample: &RawOrientationSample) -> RotationMatrix {
    let [q1, q2, q3, w] = sample.vector;
    let q0 = if sample.has_scalar {
        w
    } else {
        let rest = 1.0 - q1 * q1 - q2 * q2 - q3 * q3;
        if rest > 0.0 {
            rest.sqrt()
        } else {
            0.0
        }
    };

    let sq_q1 = 2.0 * q1 * q1;
    let sq_q2 = 2.0 * q2 * q2;
    let sq_q3 = 2.0 * q3 * q3;
    let q1_q2 = 2.0 * q1 * q2;
    let q3_q0 = 2.0 * q3 * q0;
    let q1_q3 = 2.0 * q1 * q3;
    let q2_q0 = 2.0 * q2 * q0;
    let q2_q3 = 2.0 * q2 * q3;
    let q1_q0 = 2.0 * q1 * q0;

    [
        1.0 - sq_q2 - sq_q3,
        q1_q2 - q3_q0,
        q1_q3 + q2_q0,
        q1_q2 + q3_q0,
        1.0 - sq_q1 - sq_q3,
        q2_q3 - q1_q0,
        q1_q3 - q2_q0,
        q2_q3 + q1_q0,
        1.0 - sq_q1 - sq_q2,
    ]
}

/// Rewrites `matrix` so its columns follow `remap`.
pub fn remap_coordinate_system(
    matrix: &RotationMatrix,
    remap: AxisRemap,
) -> Result<RotationMatrix, RemapError> {
    if remap.x.index() == remap.y.index() {
        return Err(RemapError::SameAxis(remap.x, remap.y));
    }
    Ok(remap_distinct(matrix, remap))
}

/// `remap` must name two different device axes.
fn remap_distinct(matrix: &RotationMatrix, remap: AxisRemap) -> RotationMatrix {
    let x = remap.x.index();
    let y = remap.y.index();
    let z = 3 - x - y;
    let cyclic = (x + 1) % 3 == y;
    let negate_x = remap.x.is_negative();
    let negate_y = remap.y.is_negative();
    let negate_z = negate_x ^ negate_y ^ !cyclic;

    let signed = |value: f32, negate: bool| if negate { -value } else { value };
    let mut out = [0.0; 9];
    for row in 0..3 {
        let offset = row * 3;
        out[offset + x] = signed(matrix[offset], negate_x);
        out[offset + y] = signed(matrix[offset + 1], negate_y);
        out[offset + z] = signed(matrix[offset + 2], negate_z);
    }
    out
}

/// Extracts azimuth, pitch and roll from a rotation matrix.
pub fn orientation_angles(matrix: &RotationMatrix) -> OrientationAngles {
    OrientationAngles {
        azimuth: matrix[1].atan2(matrix[4]),
        pitch: (-matrix[7]).clamp(-1.0, 1.0).asin(),
        roll: (-matrix[6]).atan2(matrix[8]),
    }
}

/// Horizontal axis follows inverted pitch, vertical axis follows roll.
pub fn tilt_from_angles(angles: OrientationAngles) -> TiltVector {
    TiltVector::new(-angles.pitch, angles.roll)
}

/// Full normalisation with the fixed [`SCREEN_REMAP`]. The result is not
/// bounded yet.
pub fn normalize(sample: &RawOrientationSample) -> TiltVector {
    let matrix = rotation_matrix_from_vector(sample);
    let remapped = remap_distinct(&matrix, SCREEN_REMAP);
    tilt_from_angles(orientation_angles(&remapped))
}
