use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::{clamp_axis, TiltVector};

/// Blend factor of the exponential low-pass filter.
///
/// Always within `[MIN, MAX]`; larger values follow the input more closely.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct SmoothingCoefficient(f32);

impl SmoothingCoefficient {
    pub const MIN: f32 = 0.01;
    pub const MAX: f32 = 1.0;
    pub const DEFAULT: f32 = 0.2;

    /// Clamps `value` silently into range. NaN falls back to the default.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(Self::DEFAULT);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> f32 {
        self.0
    }

    pub fn is_passthrough(self) -> bool {
        self.0 >= Self::MAX
    }
}

impl Default for SmoothingCoefficient {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Coefficient shared between the settings surface and the sample path.
///
/// Stored as raw `f32` bits so the sample path can read it fresh for every
/// sample without locking.
#[derive(Debug)]
pub(crate) struct SharedCoefficient(AtomicU32);

impl SharedCoefficient {
    pub fn new(coefficient: SmoothingCoefficient) -> Self {
        Self(AtomicU32::new(coefficient.get().to_bits()))
    }

    pub fn load(&self) -> SmoothingCoefficient {
        SmoothingCoefficient(f32::from_bits(self.0.load(Ordering::Acquire)))
    }

    pub fn store(&self, coefficient: SmoothingCoefficient) {
        self.0.store(coefficient.get().to_bits(), Ordering::Release);
    }
}

/// Per-axis exponential moving average with range clamping folded into the
/// state.
///
/// Each step computes `last + (input - last) * c`, clamps it to the tilt
/// range, and keeps the clamped value as the next `last`. Sustained extreme
/// input therefore saturates at the bound instead of accumulating overshoot.
#[derive(Debug, Clone, Default)]
pub struct SmoothingFilter {
    last: TiltVector,
}

impl SmoothingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self, input: TiltVector, coefficient: SmoothingCoefficient) -> TiltVector {
        if coefficient.is_passthrough() {
            // Same recurrence with c = 1, minus the rounding of `last + (input - last)`.
            self.last = input.clamped();
            return self.last;
        }
        let c = coefficient.get();
        let x = clamp_axis(self.last.x + (input.x - self.last.x) * c);
        let y = clamp_axis(self.last.y + (input.y - self.last.y) * c);
        self.last = TiltVector::new(x, y);
        self.last
    }

    pub fn last(&self) -> TiltVector {
        self.last
    }
}
