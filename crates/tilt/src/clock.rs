use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};

use crate::cell::{Packed, SignalCell};

/// Frame time wraps after this long to keep `f32` precision in the shader.
pub const FRAME_TIME_WRAP: Duration = Duration::from_secs(3600);

const WRAP_MILLIS: u128 = FRAME_TIME_WRAP.as_millis();

/// Seconds since the clock epoch, wrapped to `[0, 3600)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct FrameTime(f32);

impl FrameTime {
    pub const ZERO: Self = Self(0.0);

    /// Wraps on whole milliseconds before converting, so the value restarts
    /// exactly at zero instead of drifting with float error.
    pub fn from_elapsed(elapsed: Duration) -> Self {
        let millis = elapsed.as_millis() % WRAP_MILLIS;
        Self(millis as f32 / 1000.0)
    }

    pub fn seconds(self) -> f32 {
        self.0
    }
}

impl fmt::Display for FrameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}s", self.0)
    }
}

impl Packed for FrameTime {
    fn pack(self) -> u64 {
        self.0.pack()
    }

    fn unpack(bits: u64) -> Self {
        Self(f32::unpack(bits))
    }
}

/// Monotonic clock anchored at its creation instant.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    epoch: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(epoch: Instant) -> Self {
        Self { epoch }
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    pub fn now(&self) -> FrameTime {
        self.at(Instant::now())
    }

    /// Frame time for a refresh signal that fired at `instant`.
    pub fn at(&self, instant: Instant) -> FrameTime {
        FrameTime::from_elapsed(instant.saturating_duration_since(self.epoch))
    }
}

/// Background thread publishing a [`FrameTime`] per refresh signal.
///
/// The thread blocks on the signal; it never polls or sleeps on its own.
/// It stops when cancelled, when dropped, or when the signal source goes away.
pub struct FrameLoop {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl FrameLoop {
    pub fn spawn(
        signal: Receiver<Instant>,
        clock: FrameClock,
        cell: SignalCell<FrameTime>,
    ) -> std::io::Result<Self> {
        let (cancel, cancelled) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("frame-loop".into())
            .spawn(move || {
                let mut frames = 0u64;
                loop {
                    select! {
                        recv(signal) -> fired => match fired {
                            Ok(instant) => {
                                cell.set(clock.at(instant));
                                frames += 1;
                            }
                            Err(_) => {
                                tracing::debug!(frames, "refresh signal closed; frame loop exiting");
                                break;
                            }
                        },
                        recv(cancelled) -> _ => break,
                    }
                }
                frames
            })?;
        Ok(Self {
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    /// Stops the loop and waits for it. Returns the number of frames it
    /// published; later calls return zero.
    pub fn cancel(&mut self) -> u64 {
        self.cancel.take();
        let Some(handle) = self.handle.take() else {
            return 0;
        };
        match handle.join() {
            Ok(frames) => frames,
            Err(_) => {
                tracing::warn!("frame loop thread panicked");
                0
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLoop")
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

const DEFAULT_HZ: f32 = 60.0;
const MIN_INTERVAL: Duration = Duration::from_millis(1);
const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Software refresh signal for headless runs.
#[derive(Debug, Clone, Copy)]
pub struct Metronome {
    interval: Duration,
}

impl Metronome {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.clamp(MIN_INTERVAL, MAX_INTERVAL),
        }
    }

    /// Rates that are not positive, or too slow for a [`Duration`], fall back
    /// to 60 Hz.
    pub fn from_hz(hz: f32) -> Self {
        let interval = if hz.is_finite() && hz > 0.0 {
            Duration::try_from_secs_f32(1.0 / hz).ok()
        } else {
            None
        };
        Self::new(interval.unwrap_or_else(|| Duration::from_secs_f32(1.0 / DEFAULT_HZ)))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts ticking. Ticks missed by a slow consumer are dropped, not queued.
    pub fn start(&self) -> Receiver<Instant> {
        tick(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_time_wraps_at_one_hour() {
        assert_eq!(FrameTime::from_elapsed(Duration::from_millis(1500)).seconds(), 1.5);
        let before = FrameTime::from_elapsed(Duration::from_millis(3_599_999));
        let after = FrameTime::from_elapsed(Duration::from_millis(3_600_016));
        assert!((before.seconds() - 3599.999).abs() < 1e-3);
        assert!((after.seconds() - 0.016).abs() < 1e-6);
        assert_eq!(FrameTime::from_elapsed(FRAME_TIME_WRAP), FrameTime::ZERO);
    }

    #[test]
    fn frame_time_is_monotonic_between_wraps() {
        let mut previous = FrameTime::ZERO;
        for millis in (0..3_600_000u64).step_by(997) {
            let now = FrameTime::from_elapsed(Duration::from_millis(millis));
            assert!(now >= previous, "{now:?} < {previous:?}");
            previous = now;
        }
    }

    #[test]
    fn clock_clamps_instants_before_epoch() {
        let epoch = Instant::now() + Duration::from_secs(5);
        let clock = FrameClock::starting_at(epoch);
        assert_eq!(clock.at(Instant::now()), FrameTime::ZERO);
        assert_eq!(
            clock.at(epoch + Duration::from_millis(250)).seconds(),
            0.25
        );
    }

    #[test]
    fn frame_loop_publishes_one_time_per_signal() {
        let clock = FrameClock::new();
        let cell = SignalCell::new(FrameTime::ZERO);
        let mut watcher = cell.watch();
        let (signal, ticks) = bounded(4);
        let mut frame_loop = FrameLoop::spawn(ticks, clock, cell.clone()).unwrap();

        signal.send(clock.epoch() + Duration::from_millis(16)).unwrap();
        let first = watcher.changed_timeout(Duration::from_secs(2)).unwrap();
        assert!((first.seconds() - 0.016).abs() < 1e-6);

        signal.send(clock.epoch() + Duration::from_millis(33)).unwrap();
        let second = watcher.changed_timeout(Duration::from_secs(2)).unwrap();
        assert!(second > first);

        assert_eq!(frame_loop.cancel(), 2);
        assert!(!frame_loop.is_running());
        assert_eq!(frame_loop.cancel(), 0);
    }

    #[test]
    fn frame_loop_stops_when_signal_disconnects() {
        let cell = SignalCell::new(FrameTime::ZERO);
        let (signal, ticks) = bounded::<Instant>(1);
        let mut frame_loop = FrameLoop::spawn(ticks, FrameClock::new(), cell).unwrap();
        drop(signal);
        assert_eq!(frame_loop.cancel(), 0);
    }

    #[test]
    fn dropping_frame_loop_stops_publishing() {
        let cell = SignalCell::new(FrameTime::ZERO);
        let metronome = Metronome::new(Duration::from_millis(2));
        let frame_loop = FrameLoop::spawn(metronome.start(), FrameClock::new(), cell.clone()).unwrap();
        let mut watcher = cell.watch();
        assert!(watcher.changed_timeout(Duration::from_secs(2)).is_some());
        drop(frame_loop);
        let settled = cell.version();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(cell.version(), settled);
    }

    #[test]
    fn metronome_rejects_nonsense_rates() {
        assert_eq!(Metronome::from_hz(0.0).interval(), Metronome::from_hz(60.0).interval());
        assert_eq!(Metronome::new(Duration::ZERO).interval(), Duration::from_millis(1));
    }

    #[test]
    fn metronome_survives_extreme_rates() {
        let default = Metronome::from_hz(60.0).interval();
        assert_eq!(Metronome::from_hz(1e-30).interval(), default);
        assert_eq!(Metronome::from_hz(f32::MIN_POSITIVE).interval(), default);
        assert_eq!(Metronome::from_hz(f32::NAN).interval(), default);
        assert_eq!(Metronome::from_hz(f32::INFINITY).interval(), default);
        assert_eq!(Metronome::from_hz(1e30).interval(), Duration::from_millis(1));
        assert_eq!(Metronome::from_hz(1e-9).interval(), Duration::from_secs(3600));
        assert_eq!(Metronome::from_hz(0.5).interval(), Duration::from_secs(2));
    }
}
