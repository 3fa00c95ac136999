//! Lock-free current-value cells with multicast change notification.
//!
//! A [`SignalCell`] holds the latest value of a continuously sampled signal.
//! The value lives in a single `AtomicU64`, so readers never block the writer
//! and can never observe half of an update. Observers that want to react to
//! changes open a [`Watcher`]; each watcher owns a one-slot wake-up channel,
//! so a slow observer coalesces any number of updates into one wake-up and
//! then reads whatever is newest. Nothing is ever queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::types::TiltVector;

/// Values that fit losslessly into one 64-bit word.
pub trait Packed: Copy {
    fn pack(self) -> u64;
    fn unpack(bits: u64) -> Self;
}

impl Packed for TiltVector {
    fn pack(self) -> u64 {
        (u64::from(self.x.to_bits()) << 32) | u64::from(self.y.to_bits())
    }

    fn unpack(bits: u64) -> Self {
        TiltVector::new(f32::from_bits((bits >> 32) as u32), f32::from_bits(bits as u32))
    }
}

impl Packed for f32 {
    fn pack(self) -> u64 {
        u64::from(self.to_bits())
    }

    fn unpack(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

struct Shared {
    bits: AtomicU64,
    version: AtomicU64,
    watchers: Mutex<Vec<Sender<()>>>,
}

/// Shared current-value cell. Cloning yields another handle to the same value.
pub struct SignalCell<T: Packed> {
    shared: Arc<Shared>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Packed> Clone for SignalCell<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Packed + std::fmt::Debug> std::fmt::Debug for SignalCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalCell")
            .field("value", &self.get())
            .field("version", &self.version())
            .finish()
    }
}

impl<T: Packed> SignalCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                bits: AtomicU64::new(initial.pack()),
                version: AtomicU64::new(0),
                watchers: Mutex::new(Vec::new()),
            }),
            _marker: std::marker::PhantomData,
        }
    }

    /// Latest value. Never blocks.
    pub fn get(&self) -> T {
        T::unpack(self.shared.bits.load(Ordering::Acquire))
    }

    /// Number of values published since creation.
    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::Acquire)
    }

    /// Replaces the value and wakes every live watcher.
    pub fn set(&self, value: T) {
        self.shared.bits.store(value.pack(), Ordering::Release);
        self.shared.version.fetch_add(1, Ordering::AcqRel);
        self.notify();
    }

    /// Read-only handle for observers that only sample the value.
    pub fn reader(&self) -> CellReader<T> {
        CellReader { cell: self.clone() }
    }

    /// Registers a new observer. It sees the current value immediately and
    /// is woken on every later change.
    pub fn watch(&self) -> Watcher<T> {
        let (sender, receiver) = bounded(1);
        if let Ok(mut watchers) = self.shared.watchers.lock() {
            watchers.push(sender);
        }
        Watcher {
            cell: self.clone(),
            wake: receiver,
            seen: self.version(),
        }
    }

    pub fn watcher_count(&self) -> usize {
        self.shared
            .watchers
            .lock()
            .map(|watchers| watchers.len())
            .unwrap_or(0)
    }

    fn notify(&self) {
        let Ok(mut watchers) = self.shared.watchers.lock() else {
            return;
        };
        // A full slot already guarantees a wake-up; only drop departed watchers.
        watchers.retain(|sender| !matches!(sender.try_send(()), Err(TrySendError::Disconnected(_))));
    }
}

/// Cloneable read-only view of a [`SignalCell`].
#[derive(Clone)]
pub struct CellReader<T: Packed> {
    cell: SignalCell<T>,
}

impl<T: Packed> CellReader<T> {
    pub fn get(&self) -> T {
        self.cell.get()
    }

    pub fn version(&self) -> u64 {
        self.cell.version()
    }

    pub fn watch(&self) -> Watcher<T> {
        self.cell.watch()
    }
}

impl<T: Packed + std::fmt::Debug> std::fmt::Debug for CellReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CellReader").field(&self.get()).finish()
    }
}

/// Change subscription on a [`SignalCell`].
pub struct Watcher<T: Packed> {
    cell: SignalCell<T>,
    wake: Receiver<()>,
    seen: u64,
}

impl<T: Packed> Watcher<T> {
    /// Latest value without waiting.
    pub fn current(&self) -> T {
        self.cell.get()
    }

    /// True when a value newer than the last one returned by this watcher exists.
    pub fn has_changed(&self) -> bool {
        self.cell.version() != self.seen
    }

    /// Blocks until the value changes, then returns the newest value.
    pub fn changed(&mut self) -> T {
        while !self.has_changed() {
            if self.wake.recv().is_err() {
                break;
            }
        }
        self.take()
    }

    /// Like [`Watcher::changed`] with an upper bound on the wait.
    pub fn changed_timeout(&mut self, timeout: Duration) -> Option<T> {
        let deadline = std::time::Instant::now() + timeout;
        while !self.has_changed() {
            match self.wake.recv_deadline(deadline) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None;
                }
            }
        }
        Some(self.take())
    }

    fn take(&mut self) -> T {
        self.seen = self.cell.version();
        self.cell.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn tilt_packing_is_lossless() {
        for tilt in [
            TiltVector::new(0.0, -0.0),
            TiltVector::new(1.5, -1.5),
            TiltVector::new(-0.123_456, 0.987_654),
        ] {
            assert_eq!(TiltVector::unpack(tilt.pack()), tilt);
        }
    }

    #[test]
    fn new_reader_sees_latest_value_without_backlog() {
        let cell = SignalCell::new(TiltVector::ZERO);
        for step in 0..10 {
            cell.set(TiltVector::new(step as f32 * 0.1, 0.0));
        }
        let watcher = cell.watch();
        assert!(!watcher.has_changed());
        assert!((watcher.current().x - 0.9).abs() < 1e-6);
        assert_eq!(cell.version(), 10);
    }

    #[test]
    fn watcher_coalesces_bursts() {
        let cell = SignalCell::new(0.0_f32);
        let mut watcher = cell.watch();
        cell.set(1.0);
        cell.set(2.0);
        cell.set(3.0);
        assert_eq!(watcher.changed_timeout(Duration::from_millis(50)), Some(3.0));
        assert_eq!(watcher.changed_timeout(Duration::from_millis(20)), None);
    }

    #[test]
    fn multiple_watchers_observe_identical_values() {
        let cell = SignalCell::new(TiltVector::ZERO);
        let mut first = cell.watch();
        let mut second = cell.reader().watch();
        cell.set(TiltVector::new(0.25, -0.5));
        let a = first.changed_timeout(Duration::from_millis(50));
        let b = second.changed_timeout(Duration::from_millis(50));
        assert_eq!(a, b);
        assert_eq!(a, Some(TiltVector::new(0.25, -0.5)));
    }

    #[test]
    fn dropped_watchers_are_pruned_on_publish() {
        let cell = SignalCell::new(0.0_f32);
        let watcher = cell.watch();
        let _kept = cell.watch();
        assert_eq!(cell.watcher_count(), 2);
        drop(watcher);
        cell.set(1.0);
        assert_eq!(cell.watcher_count(), 1);
    }

    #[test]
    fn concurrent_readers_never_see_torn_values() {
        let cell = SignalCell::new(TiltVector::ZERO);
        let writer = cell.clone();
        let handle = thread::spawn(move || {
            for step in 0..20_000 {
                let v = (step % 100) as f32 * 0.01;
                writer.set(TiltVector::new(v, -v));
            }
        });
        let reader = cell.reader();
        for _ in 0..20_000 {
            let tilt = reader.get();
            assert_eq!(tilt.x, -tilt.y);
        }
        handle.join().unwrap();
    }

    #[test]
    fn watcher_wakes_across_threads() {
        let cell = SignalCell::new(0.0_f32);
        let mut watcher = cell.watch();
        let writer = cell.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.set(42.0);
        });
        assert_eq!(watcher.changed_timeout(Duration::from_secs(2)), Some(42.0));
        handle.join().unwrap();
    }
}
