//! Headless tilt readout: the same pipeline as the window, with a software
//! metronome standing in for the display refresh.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tilt::{
    Accuracy, FrameClock, FrameLoop, FrameTime, Metronome, OrientationSampler, SensorStatus,
    SignalCell, TiltController, TiltVector, TILT_LIMIT,
};

use crate::bindings::{self, SensorPlan};
use crate::cli::DebugArgs;
use crate::paths::AppPaths;
use crate::run::load_config;

#[derive(Debug, Clone, Serialize)]
pub struct Readout {
    pub frame: u64,
    pub time: f32,
    pub x: f32,
    pub y: f32,
    pub x_deg: f32,
    pub y_deg: f32,
    pub magnitude: f32,
    pub limit: f32,
    pub sensor: &'static str,
    pub accuracy: Accuracy,
}

impl Readout {
    pub fn new(frame: u64, time: FrameTime, tilt: TiltVector, status: SensorStatus, accuracy: Accuracy) -> Self {
        let (x_deg, y_deg) = tilt.to_degrees();
        Self {
            frame,
            time: time.seconds(),
            x: tilt.x,
            y: tilt.y,
            x_deg,
            y_deg,
            magnitude: tilt.magnitude(),
            limit: TILT_LIMIT,
            sensor: status_label(status),
            accuracy,
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "frame {:>4}  t={:>7.2}s  x={:+.3} rad ({:+6.1}°)  y={:+.3} rad ({:+6.1}°)  |tilt|={:.3}  limit=±{:.2}  sensor={}",
            self.frame,
            self.time,
            self.x,
            self.x_deg,
            self.y,
            self.y_deg,
            self.magnitude,
            self.limit,
            self.sensor
        )
    }
}

pub fn status_label(status: SensorStatus) -> &'static str {
    match status {
        SensorStatus::Inactive => "inactive",
        SensorStatus::Active => "active",
        SensorStatus::Unavailable => "unavailable",
    }
}

pub fn run(args: DebugArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config = load_config(args.source.config.as_deref(), &paths)?;
    let plan = SensorPlan::resolve(&args.source, &config)?;
    let controller = TiltController::new(bindings::smoothing(&args.source, &config));

    let sampler = OrientationSampler::activate(plan.build()?, &controller, plan.rate);

    let metronome = Metronome::from_hz(args.hz);
    let time = SignalCell::new(FrameTime::ZERO);
    let mut watcher = time.watch();
    let mut frame_loop = FrameLoop::spawn(metronome.start(), FrameClock::new(), time.clone())
        .context("failed to spawn frame loop thread")?;
    let patience = metronome.interval() * 4 + Duration::from_secs(1);

    for frame in 1..=args.frames {
        let now = watcher
            .changed_timeout(patience)
            .ok_or_else(|| anyhow!("frame loop stopped after {} frames", frame - 1))?;
        let readout = Readout::new(
            frame,
            now,
            controller.tilt(),
            controller.sensor_status(),
            controller.accuracy(),
        );
        if args.json {
            println!("{}", serde_json::to_string(&readout)?);
        } else {
            println!("{}", readout.to_line());
        }
    }

    let frames = frame_loop.cancel();
    tracing::debug!(frames, sensor = sampler.sensor_name(), "debug readout finished");
    drop(sampler);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readout_line_reports_radians_degrees_and_limit() {
        let readout = Readout::new(
            2,
            FrameTime::from_elapsed(Duration::from_millis(1250)),
            TiltVector::new(0.5, -0.25),
            SensorStatus::Active,
            Accuracy::High,
        );
        let line = readout.to_line();
        assert!(line.starts_with("frame    2"), "{line}");
        assert!(line.contains("t=   1.25s"), "{line}");
        assert!(line.contains("x=+0.500 rad ( +28.6°)"), "{line}");
        assert!(line.contains("y=-0.250 rad ( -14.3°)"), "{line}");
        assert!(line.contains("|tilt|=0.559"), "{line}");
        assert!(line.contains("limit=±1.50"), "{line}");
        assert!(line.ends_with("sensor=active"), "{line}");
    }

    #[test]
    fn readout_serialises_accuracy_in_lowercase() {
        let readout = Readout::new(
            1,
            FrameTime::ZERO,
            TiltVector::ZERO,
            SensorStatus::Unavailable,
            Accuracy::Unreliable,
        );
        let json = serde_json::to_value(&readout).unwrap();
        assert_eq!(json["accuracy"], "unreliable");
        assert_eq!(json["sensor"], "unavailable");
        assert_eq!(json["limit"], 1.5);
    }
}
