use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::cell::{CellReader, SignalCell, Watcher};
use crate::filter::{SharedCoefficient, SmoothingCoefficient, SmoothingFilter};
use crate::normalize::normalize;
use crate::types::{Accuracy, RawOrientationSample, TiltVector};

/// Whether the orientation sensor is feeding the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStatus {
    /// No registration attempted yet.
    Inactive,
    Active,
    /// Registration failed; the tilt signal stays at its last value (zero by default).
    Unavailable,
}

impl SensorStatus {
    fn as_u8(self) -> u8 {
        match self {
            SensorStatus::Inactive => 0,
            SensorStatus::Active => 1,
            SensorStatus::Unavailable => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SensorStatus::Active,
            2 => SensorStatus::Unavailable,
            _ => SensorStatus::Inactive,
        }
    }
}

/// Writer-side state combining the filtered reading and the calibration origin.
#[derive(Debug, Default)]
struct Origin {
    raw: TiltVector,
    offset: TiltVector,
}

struct Inner {
    coefficient: SharedCoefficient,
    origin: Mutex<Origin>,
    published: SignalCell<TiltVector>,
    raw: SignalCell<TiltVector>,
    status: AtomicU8,
    accuracy: AtomicU8,
}

/// Owner of the published tilt signal and its user-facing controls.
///
/// The sample path ([`TiltController::ingest`]) and the calibration controls
/// both end in [`TiltController::republish`], which writes `raw - offset`
/// into the published cell. Writers are serialised on a small mutex;
/// observers read the published cell without ever touching it.
#[derive(Clone)]
pub struct TiltController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TiltController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiltController")
            .field("published", &self.tilt())
            .field("coefficient", &self.smoothing_coefficient())
            .field("status", &self.sensor_status())
            .finish()
    }
}

impl Default for TiltController {
    fn default() -> Self {
        Self::new(SmoothingCoefficient::default())
    }
}

impl TiltController {
    pub fn new(coefficient: SmoothingCoefficient) -> Self {
        Self {
            inner: Arc::new(Inner {
                coefficient: SharedCoefficient::new(coefficient),
                origin: Mutex::new(Origin::default()),
                published: SignalCell::new(TiltVector::ZERO),
                raw: SignalCell::new(TiltVector::ZERO),
                status: AtomicU8::new(SensorStatus::Inactive.as_u8()),
                accuracy: AtomicU8::new(Accuracy::High.as_u8()),
            }),
        }
    }

    /// Latest published tilt (`raw - offset`).
    pub fn tilt(&self) -> TiltVector {
        self.inner.published.get()
    }

    /// Read-only handle to the published tilt for renderers and overlays.
    pub fn reader(&self) -> CellReader<TiltVector> {
        self.inner.published.reader()
    }

    pub fn watch(&self) -> Watcher<TiltVector> {
        self.inner.published.watch()
    }

    /// Latest filtered and clamped reading before the calibration offset.
    pub fn raw_tilt(&self) -> TiltVector {
        self.inner.raw.get()
    }

    pub fn calibration_offset(&self) -> TiltVector {
        self.lock_origin().offset
    }

    pub fn smoothing_coefficient(&self) -> SmoothingCoefficient {
        self.inner.coefficient.load()
    }

    /// Stores `value` clamped to `[0.01, 1.0]`. Takes effect on the next sample.
    pub fn set_smoothing_coefficient(&self, value: f32) -> SmoothingCoefficient {
        let coefficient = SmoothingCoefficient::new(value);
        self.inner.coefficient.store(coefficient);
        tracing::debug!(coefficient = coefficient.get(), "smoothing coefficient updated");
        coefficient
    }

    /// Makes the current attitude the new level origin.
    pub fn calibrate(&self) {
        let mut origin = self.lock_origin();
        origin.offset = origin.raw;
        tracing::info!(
            offset_x = origin.offset.x,
            offset_y = origin.offset.y,
            "calibrated tilt origin"
        );
        self.republish(&origin);
    }

    /// Restores the factory origin (zero offset).
    pub fn reset_calibration(&self) {
        let mut origin = self.lock_origin();
        origin.offset = TiltVector::ZERO;
        tracing::info!("calibration origin reset");
        self.republish(&origin);
    }

    /// Runs one sample through normalisation, smoothing and clamping, then
    /// republishes. `filter` is the sample path's private filter state.
    ///
    /// Samples with non-finite angles are dropped and leave the filter untouched.
    pub fn ingest(&self, filter: &mut SmoothingFilter, sample: &RawOrientationSample) -> Option<TiltVector> {
        let unbounded = normalize(sample);
        if !unbounded.is_finite() {
            tracing::trace!(?sample, "dropping non-finite orientation sample");
            return None;
        }
        let filtered = filter.step(unbounded, self.smoothing_coefficient());
        Some(self.publish_raw(filtered))
    }

    /// Publishes an already filtered and clamped reading.
    pub fn publish_raw(&self, filtered: TiltVector) -> TiltVector {
        let mut origin = self.lock_origin();
        origin.raw = filtered.clamped();
        self.inner.raw.set(origin.raw);
        self.republish(&origin)
    }

    pub fn sensor_status(&self) -> SensorStatus {
        SensorStatus::from_u8(self.inner.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_sensor_status(&self, status: SensorStatus) {
        self.inner.status.store(status.as_u8(), Ordering::Release);
    }

    /// Most recent accuracy reported by the sensor.
    pub fn accuracy(&self) -> Accuracy {
        Accuracy::from_u8(self.inner.accuracy.load(Ordering::Acquire))
    }

    pub(crate) fn set_accuracy(&self, accuracy: Accuracy) {
        let previous = Accuracy::from_u8(
            self.inner
                .accuracy
                .swap(accuracy.as_u8(), Ordering::AcqRel),
        );
        if previous != accuracy && accuracy.is_unreliable() {
            tracing::warn!("orientation sensor reports unreliable accuracy");
        } else if previous != accuracy {
            tracing::debug!(?accuracy, "orientation sensor accuracy changed");
        }
    }

    fn republish(&self, origin: &Origin) -> TiltVector {
        let published = (origin.raw - origin.offset).clamped();
        self.inner.published.set(published);
        published
    }

    fn lock_origin(&self) -> std::sync::MutexGuard<'_, Origin> {
        // The origin is two plain vectors; a panic mid-update cannot leave it
        // in a state worse than either value.
        self.inner
            .origin
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
