use bytemuck::{Pod, Zeroable};

use crate::binder::UniformSnapshot;
use crate::types::Rgb;

/// Number of `vec3` colors in the block, each padded to a `vec4`.
pub(crate) const COLOR_SLOTS: usize = 11;

/// CPU mirror of the `ReactiveBoxParams` block declared in `compile::HEADER`.
///
/// Colors are stored as `vec4` so the std140 layout never depends on how a
/// driver packs trailing `vec3` members.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ReactiveBoxUniforms {
    pub tilt: [f32; 2],
    pub resolution: [f32; 2],
    pub time: f32,
    pub edge_thickness: f32,
    pub rim_intensity: f32,
    pub face_brightness: f32,
    pub ao_strength: f32,
    pub ao_radius: f32,
    pub specular_power: f32,
    pub noise_strength: f32,
    pub colors: [[f32; 4]; COLOR_SLOTS],
}

unsafe impl Zeroable for ReactiveBoxUniforms {}
unsafe impl Pod for ReactiveBoxUniforms {}

fn padded(color: Rgb) -> [f32; 4] {
    [color.r, color.g, color.b, 1.0]
}

impl From<&UniformSnapshot> for ReactiveBoxUniforms {
    fn from(snapshot: &UniformSnapshot) -> Self {
        let p = &snapshot.params;
        Self {
            tilt: snapshot.tilt.as_array(),
            resolution: snapshot.resolution,
            time: snapshot.time.seconds(),
            edge_thickness: p.edge_thickness,
            rim_intensity: p.rim_intensity,
            face_brightness: p.face_brightness,
            ao_strength: p.ao_strength,
            ao_radius: p.ao_radius,
            specular_power: p.specular_power,
            noise_strength: p.noise_strength,
            colors: [
                padded(p.neon_line),
                padded(p.highlight),
                padded(p.box_color),
                padded(p.top.light),
                padded(p.top.dark),
                padded(p.bottom.light),
                padded(p.bottom.dark),
                padded(p.left.light),
                padded(p.left.dark),
                padded(p.right.light),
                padded(p.right.dark),
            ],
        }
    }
}
