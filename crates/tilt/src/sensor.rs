use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::controller::{SensorStatus, TiltController};
use crate::filter::SmoothingFilter;
use crate::sources::ReplayError;
use crate::types::{Accuracy, RawOrientationSample};

/// Delivery-rate hint passed to a backend. Backends may deliver faster or
/// slower; the pipeline only ever keeps the newest sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingRate {
    Fastest,
    /// Rate suited to games and interactive visuals.
    #[default]
    Game,
    Ui,
    Normal,
    Custom(Duration),
}

impl SamplingRate {
    pub fn interval(self) -> Duration {
        match self {
            SamplingRate::Fastest => Duration::from_millis(5),
            SamplingRate::Game => Duration::from_millis(20),
            SamplingRate::Ui => Duration::from_millis(60),
            SamplingRate::Normal => Duration::from_millis(200),
            SamplingRate::Custom(interval) => interval.max(Duration::from_millis(1)),
        }
    }
}

impl fmt::Display for SamplingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingRate::Fastest => f.write_str("fastest"),
            SamplingRate::Game => f.write_str("game"),
            SamplingRate::Ui => f.write_str("ui"),
            SamplingRate::Normal => f.write_str("normal"),
            SamplingRate::Custom(interval) => write!(f, "{}ms", interval.as_millis()),
        }
    }
}

impl FromStr for SamplingRate {
    type Err = SensorError;

    /// Parses the preset names; explicit intervals go through [`SamplingRate::Custom`].
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fastest" => Ok(SamplingRate::Fastest),
            "game" => Ok(SamplingRate::Game),
            "ui" => Ok(SamplingRate::Ui),
            "normal" => Ok(SamplingRate::Normal),
            other => Err(SensorError::UnknownRate(other.to_string())),
        }
    }
}

/// Everything a backend can report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorEvent {
    Sample(RawOrientationSample),
    Accuracy(Accuracy),
}

/// Callback a backend invokes for each event, on the backend's own thread.
pub type EventSink = Box<dyn FnMut(SensorEvent) + Send + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("no orientation sensor available: {0}")]
    Unavailable(String),
    #[error("sensor `{0}` is already registered")]
    AlreadyRegistered(String),
    #[error("unknown sampling rate `{0}` (expected fastest, game, ui or normal)")]
    UnknownRate(String),
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error("failed to start sensor thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// A source of rotation-vector readings.
///
/// `register` starts delivery into `sink`; `unregister` stops it and must be
/// safe to call when nothing is registered.
pub trait SensorBackend: Send {
    fn name(&self) -> &str;
    fn register(&mut self, rate: SamplingRate, sink: EventSink) -> Result<(), SensorError>;
    fn unregister(&mut self);
}

impl<B: SensorBackend + ?Sized> SensorBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn register(&mut self, rate: SamplingRate, sink: EventSink) -> Result<(), SensorError> {
        (**self).register(rate, sink)
    }

    fn unregister(&mut self) {
        (**self).unregister()
    }
}

/// Wires a backend into a [`TiltController`].
pub struct OrientationSampler;

impl OrientationSampler {
    /// Registers `backend` and routes its samples through the controller.
    ///
    /// Never fails: when registration is refused the controller reports
    /// [`SensorStatus::Unavailable`] and the tilt stays where it is.
    pub fn activate<B>(mut backend: B, controller: &TiltController, rate: SamplingRate) -> SamplerGuard<B>
    where
        B: SensorBackend,
    {
        let sink = sample_sink(controller.clone());
        let registered = match backend.register(rate, sink) {
            Ok(()) => {
                tracing::info!(sensor = backend.name(), %rate, "orientation sensor registered");
                controller.set_sensor_status(SensorStatus::Active);
                true
            }
            Err(err) => {
                tracing::warn!(sensor = backend.name(), error = %err, "orientation sensor unavailable; tilt stays at rest");
                controller.set_sensor_status(SensorStatus::Unavailable);
                false
            }
        };
        SamplerGuard {
            backend,
            controller: controller.clone(),
            registered,
        }
    }
}

fn sample_sink(controller: TiltController) -> EventSink {
    let mut filter = SmoothingFilter::new();
    Box::new(move |event| match event {
        SensorEvent::Sample(sample) => {
            controller.set_accuracy(sample.accuracy);
            controller.ingest(&mut filter, &sample);
        }
        SensorEvent::Accuracy(accuracy) => controller.set_accuracy(accuracy),
    })
}

/// Keeps a backend registered. Dropping the guard unregisters it, including
/// during unwinding.
pub struct SamplerGuard<B: SensorBackend> {
    backend: B,
    controller: TiltController,
    registered: bool,
}

impl<B: SensorBackend> SamplerGuard<B> {
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn sensor_name(&self) -> &str {
        self.backend.name()
    }
}

impl<B: SensorBackend> fmt::Debug for SamplerGuard<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplerGuard")
            .field("sensor", &self.backend.name())
            .field("registered", &self.registered)
            .finish()
    }
}

impl<B: SensorBackend> Drop for SamplerGuard<B> {
    fn drop(&mut self) {
        self.backend.unregister();
        if self.registered {
            tracing::debug!(sensor = self.backend.name(), "orientation sensor unregistered");
            self.controller.set_sensor_status(SensorStatus::Inactive);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TiltVector;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        sink: Option<EventSink>,
        registrations: usize,
        unregistrations: usize,
        rate: Option<SamplingRate>,
    }

    /// Backend that hands its sink to the test instead of running a thread.
    #[derive(Clone, Default)]
    struct ManualSensor {
        recorder: Arc<Mutex<Recorder>>,
        refuse: bool,
    }

    impl ManualSensor {
        fn emit(&self, event: SensorEvent) {
            let mut recorder = self.recorder.lock().unwrap();
            let sink = recorder.sink.as_mut().expect("sensor registered");
            sink(event);
        }
    }

    impl SensorBackend for ManualSensor {
        fn name(&self) -> &str {
            "manual"
        }

        fn register(&mut self, rate: SamplingRate, sink: EventSink) -> Result<(), SensorError> {
            if self.refuse {
                return Err(SensorError::Unavailable("test double".into()));
            }
            let mut recorder = self.recorder.lock().unwrap();
            recorder.registrations += 1;
            recorder.rate = Some(rate);
            recorder.sink = Some(sink);
            Ok(())
        }

        fn unregister(&mut self) {
            let mut recorder = self.recorder.lock().unwrap();
            recorder.unregistrations += 1;
            recorder.sink = None;
        }
    }

    #[test]
    fn samples_flow_into_controller() {
        let controller = TiltController::default();
        controller.set_smoothing_coefficient(1.0);
        let sensor = ManualSensor::default();
        let guard = OrientationSampler::activate(sensor.clone(), &controller, SamplingRate::Game);
        assert!(guard.is_registered());
        assert_eq!(controller.sensor_status(), SensorStatus::Active);
        assert_eq!(sensor.recorder.lock().unwrap().rate, Some(SamplingRate::Game));

        sensor.emit(SensorEvent::Sample(RawOrientationSample::from_axis_angle(
            [1.0, 0.0, 0.0],
            0.3,
            Accuracy::Medium,
        )));
        let tilt = controller.tilt();
        assert!(tilt.x.abs() < 1e-5);
        assert!((tilt.y - 0.3).abs() < 1e-5);
        assert_eq!(controller.accuracy(), Accuracy::Medium);
    }

    #[test]
    fn dropping_guard_unregisters() {
        let controller = TiltController::default();
        let sensor = ManualSensor::default();
        {
            let _guard = OrientationSampler::activate(sensor.clone(), &controller, SamplingRate::Ui);
            assert_eq!(sensor.recorder.lock().unwrap().registrations, 1);
        }
        let recorder = sensor.recorder.lock().unwrap();
        assert_eq!(recorder.unregistrations, 1);
        assert!(recorder.sink.is_none());
        assert_eq!(controller.sensor_status(), SensorStatus::Inactive);
    }

    #[test]
    fn guard_unregisters_during_unwinding() {
        let controller = TiltController::default();
        let sensor = ManualSensor::default();
        let recorder = Arc::clone(&sensor.recorder);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = OrientationSampler::activate(sensor, &controller, SamplingRate::Game);
            panic!("surface torn down");
        }));
        assert!(result.is_err());
        assert_eq!(recorder.lock().unwrap().unregistrations, 1);
    }

    #[test]
    fn refused_registration_reports_unavailable() {
        let controller = TiltController::default();
        let sensor = ManualSensor {
            refuse: true,
            ..ManualSensor::default()
        };
        let guard = OrientationSampler::activate(sensor, &controller, SamplingRate::Game);
        assert!(!guard.is_registered());
        assert_eq!(controller.sensor_status(), SensorStatus::Unavailable);
        assert_eq!(controller.tilt(), TiltVector::ZERO);
    }

    #[test]
    fn accuracy_events_update_controller_only() {
        let controller = TiltController::default();
        let sensor = ManualSensor::default();
        let _guard = OrientationSampler::activate(sensor.clone(), &controller, SamplingRate::Game);
        sensor.emit(SensorEvent::Accuracy(Accuracy::Unreliable));
        assert_eq!(controller.accuracy(), Accuracy::Unreliable);
        assert_eq!(controller.tilt(), TiltVector::ZERO);
    }

    #[test]
    fn rate_presets_parse_case_insensitively() {
        assert_eq!("Game".parse::<SamplingRate>().unwrap(), SamplingRate::Game);
        assert_eq!(" ui ".parse::<SamplingRate>().unwrap(), SamplingRate::Ui);
        assert!(matches!(
            "warp".parse::<SamplingRate>(),
            Err(SensorError::UnknownRate(name)) if name == "warp"
        ));
        assert_eq!(SamplingRate::Game.interval(), Duration::from_millis(20));
        assert_eq!(
            SamplingRate::Custom(Duration::ZERO).interval(),
            Duration::from_millis(1)
        );
    }
}
