//! Concrete [`SensorBackend`]s for desktop use.
//!
//! Desktop machines rarely expose an orientation sensor, so the crate ships
//! with backends that synthesise, replay or stream rotation vectors instead.
//! Each active backend runs one named thread that calls the sink directly;
//! there is no queue between a backend and the pipeline.

use std::f32::consts::TAU;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::sensor::{EventSink, SamplingRate, SensorBackend, SensorError, SensorEvent};
use crate::types::{Accuracy, RawOrientationSample};

/// Background delivery thread plus the channel used to stop it.
struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn<F>(name: &str, body: F) -> Result<Self, SensorError>
    where
        F: FnOnce(Receiver<()>) + Send + 'static,
    {
        let (stop, stopped) = bounded(0);
        let handle = thread::Builder::new()
            .name(format!("sensor-{name}"))
            .spawn(move || body(stopped))?;
        Ok(Self { stop, handle })
    }

    fn shutdown(self) {
        drop(self.stop);
        if self.handle.join().is_err() {
            tracing::warn!("sensor thread panicked");
        }
    }
}

/// Sleeps for `delay` unless a stop is requested first. Returns `false` once
/// the worker should exit.
fn pause(stopped: &Receiver<()>, delay: Duration) -> bool {
    matches!(stopped.recv_timeout(delay), Err(RecvTimeoutError::Timeout))
}

/// Always refuses registration. Stands in for hardware without an
/// orientation sensor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSensor;

impl SensorBackend for NullSensor {
    fn name(&self) -> &str {
        "none"
    }

    fn register(&mut self, _rate: SamplingRate, _sink: EventSink) -> Result<(), SensorError> {
        Err(SensorError::Unavailable(
            "this device has no rotation vector sensor".into(),
        ))
    }

    fn unregister(&mut self) {}
}

/// Gentle figure-of-eight wobble with a little random jitter, delivered at
/// the requested rate.
pub struct SyntheticSensor {
    wobble: Wobble,
    seed: Option<u64>,
    worker: Option<Worker>,
}

#[derive(Debug, Clone, Copy)]
struct Wobble {
    amplitude: f32,
    period: Duration,
    jitter: f32,
}

impl Wobble {
    fn sample_at(self, elapsed: Duration) -> RawOrientationSample {
        let phase = TAU * elapsed.as_secs_f32() / self.period.as_secs_f32();
        let horizontal = self.amplitude * phase.sin();
        let vertical = self.amplitude * (2.0 * phase).sin() * 0.5;
        tilted(horizontal, vertical)
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self {
            wobble: Wobble {
                amplitude: 0.35,
                period: Duration::from_secs(6),
                jitter: 0.01,
            },
            seed: None,
            worker: None,
        }
    }
}

impl SyntheticSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peak tilt in radians on each axis.
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.wobble.amplitude = amplitude.abs();
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.wobble.period = period.max(Duration::from_millis(1));
        self
    }

    /// Half-width of the uniform noise added to each sample, in radians.
    pub fn with_jitter(mut self, jitter: f32) -> Self {
        self.wobble.jitter = jitter.abs();
        self
    }

    /// Fixes the jitter sequence for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Noise-free sample for `elapsed` time since registration.
    pub fn sample_at(&self, elapsed: Duration) -> RawOrientationSample {
        self.wobble.sample_at(elapsed)
    }
}

/// Quaternion whose normalised tilt is approximately `(horizontal, vertical)`.
///
/// Vertical tilt is a rotation about device X, horizontal tilt the inverse
/// rotation about device Y.
fn tilted(horizontal: f32, vertical: f32) -> RawOrientationSample {
    let (sx, cx) = (vertical * 0.5).sin_cos();
    let (sy, cy) = (-horizontal * 0.5).sin_cos();
    // q = qx * qy
    RawOrientationSample::from_quaternion([sx * cy, cx * sy, sx * sy, cx * cy], Accuracy::High)
}

impl SensorBackend for SyntheticSensor {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn register(&mut self, rate: SamplingRate, mut sink: EventSink) -> Result<(), SensorError> {
        if self.worker.is_some() {
            return Err(SensorError::AlreadyRegistered(self.name().into()));
        }
        let interval = rate.interval();
        let wobble = self.wobble;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.worker = Some(Worker::spawn("synthetic", move |stopped| {
            let started = Instant::now();
            loop {
                let base = wobble.sample_at(started.elapsed());
                let sample = if wobble.jitter > 0.0 {
                    jittered(base, wobble.jitter, &mut rng)
                } else {
                    base
                };
                sink(SensorEvent::Sample(sample));
                if !pause(&stopped, interval) {
                    break;
                }
            }
        })?);
        Ok(())
    }

    fn unregister(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

impl Drop for SyntheticSensor {
    fn drop(&mut self) {
        self.unregister();
    }
}

fn jittered(sample: RawOrientationSample, jitter: f32, rng: &mut StdRng) -> RawOrientationSample {
    let mut vector = sample.vector;
    for component in vector.iter_mut().take(3) {
        *component += rng.gen_range(-jitter..=jitter) * 0.5;
    }
    let norm = vector.iter().map(|c| c * c).sum::<f32>().sqrt();
    if norm > 0.0 {
        for component in vector.iter_mut() {
            *component /= norm;
        }
    }
    RawOrientationSample::from_quaternion(vector, sample.accuracy)
}

/// One line of a sensor recording.
///
/// `vector` holds three or four rotation-vector components; a line without
/// `vector` only reports an accuracy change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    #[serde(default)]
    pub t_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    #[serde(default)]
    pub accuracy: Accuracy,
}

impl RecordedEvent {
    pub fn sample(t_ms: u64, sample: &RawOrientationSample) -> Self {
        let vector = if sample.has_scalar {
            sample.vector.to_vec()
        } else {
            sample.vector[..3].to_vec()
        };
        Self {
            t_ms,
            vector: Some(vector),
            accuracy: sample.accuracy,
        }
    }

    fn to_event(&self, line: usize) -> Result<SensorEvent, ReplayError> {
        let Some(vector) = &self.vector else {
            return Ok(SensorEvent::Accuracy(self.accuracy));
        };
        let sample = match vector.as_slice() {
            [x, y, z] => RawOrientationSample::from_vector([*x, *y, *z], self.accuracy),
            [x, y, z, w] => RawOrientationSample::from_quaternion([*x, *y, *z, *w], self.accuracy),
            other => {
                return Err(ReplayError::VectorLength {
                    line,
                    len: other.len(),
                })
            }
        };
        Ok(SensorEvent::Sample(sample))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read recording {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: invalid sensor record: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: rotation vector must have 3 or 4 components, found {len}")]
    VectorLength { line: usize, len: usize },
    #[error("recording contains no events")]
    Empty,
}

/// Parses one JSON-lines recording. Blank lines and `#` comments are skipped.
pub fn parse_recording<R: BufRead>(reader: R) -> Result<Vec<(u64, SensorEvent)>, ReplayError> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let line = line.map_err(|source| ReplayError::Io {
            path: PathBuf::from("<reader>"),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: RecordedEvent = serde_json::from_str(trimmed).map_err(|source| ReplayError::Parse {
            line: number,
            source,
        })?;
        events.push((record.t_ms, record.to_event(number)?));
    }
    if events.is_empty() {
        return Err(ReplayError::Empty);
    }
    Ok(events)
}

/// Plays back a recorded session with its original timing.
///
/// The sampling-rate hint is ignored; recordings carry their own timestamps.
pub struct ReplaySensor {
    events: Arc<Vec<(u64, SensorEvent)>>,
    looping: bool,
    worker: Option<Worker>,
}

impl ReplaySensor {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let events = parse_recording(BufReader::new(file))?;
        tracing::debug!(path = %path.display(), events = events.len(), "loaded sensor recording");
        Ok(Self::from_events(events))
    }

    pub fn from_events(events: Vec<(u64, SensorEvent)>) -> Self {
        Self {
            events: Arc::new(events),
            looping: false,
            worker: None,
        }
    }

    /// Restart from the first event after the last one.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl SensorBackend for ReplaySensor {
    fn name(&self) -> &str {
        "replay"
    }

    fn register(&mut self, _rate: SamplingRate, mut sink: EventSink) -> Result<(), SensorError> {
        if self.worker.is_some() {
            return Err(SensorError::AlreadyRegistered(self.name().into()));
        }
        let events = Arc::clone(&self.events);
        let looping = self.looping;
        self.worker = Some(Worker::spawn("replay", move |stopped| {
            'playback: loop {
                let mut previous = events.first().map(|(t, _)| *t).unwrap_or(0);
                for (t_ms, event) in events.iter() {
                    let delay = Duration::from_millis(t_ms.saturating_sub(previous));
                    previous = *t_ms;
                    if !delay.is_zero() && !pause(&stopped, delay) {
                        break 'playback;
                    }
                    sink(*event);
                }
                if !looping {
                    tracing::debug!("sensor recording finished");
                    break;
                }
                // Keep a stop request responsive between loops.
                if !pause(&stopped, Duration::from_millis(1)) {
                    break;
                }
            }
        })?);
        Ok(())
    }

    fn unregister(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

impl Drop for ReplaySensor {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Live JSON-lines feed, typically a phone or microcontroller piped into stdin.
///
/// Blocking reads cannot be interrupted, so `unregister` detaches the
/// reader thread; it exits at the next line or at end of input.
pub struct StreamSensor {
    source: Option<Box<dyn BufRead + Send>>,
    label: String,
    stop: Option<Arc<AtomicBool>>,
}

impl StreamSensor {
    pub fn new(label: impl Into<String>, source: Box<dyn BufRead + Send>) -> Self {
        Self {
            source: Some(source),
            label: label.into(),
            stop: None,
        }
    }

    pub fn stdin() -> Self {
        Self::new("stdin", Box::new(BufReader::new(std::io::stdin())))
    }
}

impl SensorBackend for StreamSensor {
    fn name(&self) -> &str {
        &self.label
    }

    fn register(&mut self, _rate: SamplingRate, mut sink: EventSink) -> Result<(), SensorError> {
        let Some(source) = self.source.take() else {
            return Err(SensorError::AlreadyRegistered(self.label.clone()));
        };
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = Arc::clone(&stop);
        let label = self.label.clone();
        thread::Builder::new()
            .name(format!("sensor-{label}"))
            .spawn(move || {
                for (index, line) in source.lines().enumerate() {
                    if stopped.load(Ordering::Acquire) {
                        break;
                    }
                    let line = match line {
                        Ok(line) => line,
                        Err(err) => {
                            tracing::warn!(source = %label, error = %err, "sensor stream closed");
                            break;
                        }
                    };
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let event = serde_json::from_str::<RecordedEvent>(trimmed)
                        .map_err(|source| ReplayError::Parse {
                            line: index + 1,
                            source,
                        })
                        .and_then(|record| record.to_event(index + 1));
                    match event {
                        Ok(event) => sink(event),
                        Err(err) => tracing::warn!(source = %label, error = %err, "skipping malformed sensor line"),
                    }
                }
                tracing::debug!(source = %label, "sensor stream ended");
            })?;
        self.stop = Some(stop);
        Ok(())
    }

    fn unregister(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Release);
        }
    }
}
