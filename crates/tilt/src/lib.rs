//! Orientation sensor pipeline for the reactive box.
//!
//! ```text
//!   SensorBackend ──▶ OrientationSampler ──▶ normalize ──▶ SmoothingFilter ──▶ clamp
//!   (own thread)        (SamplerGuard)                                        │
//!                                                                             ▼
//!                            calibrate() / reset_calibration() ──▶ TiltController ──▶ SignalCell<TiltVector>
//!
//!   refresh tick ──▶ FrameLoop ──▶ SignalCell<FrameTime>
//! ```
//!
//! Both producers write single current-value cells; any number of readers
//! take the latest value without blocking. A sample is processed to
//! completion on the backend's thread and nothing is queued, so the newest
//! sample always wins.

mod cell;
mod clock;
mod controller;
mod filter;
mod normalize;
mod sensor;
mod sources;
mod types;

pub use cell::{CellReader, Packed, SignalCell, Watcher};
pub use clock::{FrameClock, FrameLoop, FrameTime, Metronome, FRAME_TIME_WRAP};
pub use controller::{SensorStatus, TiltController};
pub use filter::{SmoothingCoefficient, SmoothingFilter};
pub use normalize::{
    normalize, orientation_angles, remap_coordinate_system, rotation_matrix_from_vector,
    tilt_from_angles, Axis, AxisRemap, RemapError, RotationMatrix, SCREEN_REMAP,
};
pub use sensor::{
    EventSink, OrientationSampler, SamplerGuard, SamplingRate, SensorBackend, SensorError,
    SensorEvent,
};
pub use sources::{
    parse_recording, NullSensor, RecordedEvent, ReplayError, ReplaySensor, StreamSensor,
    SyntheticSensor,
};
pub use types::{clamp_axis, Accuracy, OrientationAngles, RawOrientationSample, TiltVector, TILT_LIMIT};
