//! The generate → transmit → sleep loop.
//!
//! Strictly sequential: the next frame is not rendered until the previous upload has
//! returned (answered, rejected or faulted). The achieved period is therefore
//! render time + upload time + the fixed sleep; nothing compensates for it.
//!
//! Stopping goes through a [`StopToken`]. It is checked at iteration boundaries and also
//! wakes the inter-frame sleep, but an upload already in flight always runs to completion
//! (or to its timeout).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::config::AnimationCfg;
use crate::error::EngineError;
use crate::events::LoopEvent;
use crate::render::{FrameGenerator, RenderSurface};
use crate::transmit::{FrameSink, TransmitOutcome};

/// Azimuth in degrees, always kept in `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct AnimationAngle(f64);

impl AnimationAngle {
    pub fn zero() -> Self {
        Self(0.0)
    }

    pub fn from_degrees(deg: f64) -> Self {
        Self(deg.rem_euclid(360.0))
    }

    pub fn degrees(self) -> f64 {
        self.0
    }

    pub fn advance(self, step_deg: f64) -> Self {
        Self::from_degrees(self.0 + step_deg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Running counters. `frames` counts every generated frame regardless of delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub delivered: u64,
    pub rejected: u64,
    pub faulted: u64,
    pub bytes_sent: u64,
}

impl LoopStats {
    fn record(&mut self, outcome: &TransmitOutcome) {
        self.frames += 1;
        match outcome {
            TransmitOutcome::Delivered { bytes, .. } => {
                self.delivered += 1;
                self.bytes_sent += *bytes as u64;
            }
            TransmitOutcome::Rejected { .. } => self.rejected += 1,
            TransmitOutcome::Fault { .. } => self.faulted += 1,
        }
    }
}

/// Result of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub index: u64,
    /// Angle the frame was rendered at (before advancing).
    pub angle_deg: f64,
    pub outcome: TransmitOutcome,
}

impl FrameReport {
    pub fn to_event(&self) -> LoopEvent {
        let (index, angle_deg) = (self.index, self.angle_deg);
        match &self.outcome {
            TransmitOutcome::Delivered { bytes, elapsed } => LoopEvent::FrameSent {
                index,
                angle_deg,
                bytes: *bytes,
                elapsed: *elapsed,
            },
            TransmitOutcome::Rejected { status, .. } => LoopEvent::FrameRejected {
                index,
                angle_deg,
                status: *status,
            },
            TransmitOutcome::Fault { reason, .. } => LoopEvent::FrameFault {
                index,
                angle_deg,
                reason: reason.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSummary {
    pub stats: LoopStats,
    pub final_angle_deg: f64,
    pub elapsed: Duration,
}

/// Trigger side of the stop signal. Cheap to clone; safe to call from any thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake: Sender<()>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.wake.try_send(());
    }
}

/// Observer side of the stop signal, handed to [`FrameLoop::run`].
#[derive(Debug, Clone)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
    wake: Receiver<()>,
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sleep up to `timeout`, returning early on stop. Returns whether stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        match self.wake.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => self.is_stopped(),
            // every handle is gone, nobody can stop us any more
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                self.is_stopped()
            }
        }
    }
}

pub fn stop_signal() -> (StopHandle, StopToken) {
    let stopped = Arc::new(AtomicBool::new(false));
    let (tx, rx) = bounded(1);
    (
        StopHandle { stopped: stopped.clone(), wake: tx },
        StopToken { stopped, wake: rx },
    )
}

/// Owns everything that lives across iterations: the drawing surface, the sink, the
/// angle and the counters.
pub struct FrameLoop<S: FrameSink> {
    generator: FrameGenerator,
    surface: RenderSurface,
    sink: S,
    cfg: AnimationCfg,
    angle: AnimationAngle,
    state: LoopState,
    stats: LoopStats,
}

impl<S: FrameSink> FrameLoop<S> {
    pub fn new(generator: FrameGenerator, sink: S, cfg: AnimationCfg) -> Self {
        let surface = generator.new_surface();
        Self {
            generator,
            surface,
            sink,
            cfg,
            angle: AnimationAngle::zero(),
            state: LoopState::Running,
            stats: LoopStats::default(),
        }
    }

    pub fn angle(&self) -> AnimationAngle {
        self.angle
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// One iteration without the trailing sleep: render, upload, advance.
    pub fn step(&mut self) -> Result<FrameReport, EngineError> {
        let angle_deg = self.angle.degrees();
        let frame = self.generator.generate(&mut self.surface, angle_deg)?;
        let outcome = self.sink.transmit(&frame)?;
        drop(frame);

        let index = self.stats.frames;
        self.stats.record(&outcome);
        self.angle = self.angle.advance(self.cfg.step_deg);

        Ok(FrameReport { index, angle_deg, outcome })
    }

    /// Run until `stop` fires. Transmission problems are reported and skipped; only a
    /// render/encode failure ends the loop early, as `Err`.
    pub fn run<F>(&mut self, stop: &StopToken, mut on_event: F) -> Result<LoopSummary, EngineError>
    where
        F: FnMut(&LoopEvent),
    {
        let started = Instant::now();
        self.state = LoopState::Running;

        while !stop.is_stopped() {
            let report = match self.step() {
                Ok(r) => r,
                Err(e) => {
                    self.state = LoopState::Stopped;
                    return Err(e);
                }
            };
            on_event(&report.to_event());

            let every = self.cfg.stats_every;
            if every > 0 && self.stats.frames % every == 0 {
                on_event(&LoopEvent::Stats {
                    stats: self.stats,
                    fps: rate(self.stats.frames, started.elapsed()),
                });
            }

            if stop.wait(self.cfg.frame_interval()) {
                break;
            }
        }

        self.state = LoopState::Stopped;
        on_event(&LoopEvent::Stopped { frames: self.stats.frames });

        Ok(LoopSummary {
            stats: self.stats,
            final_angle_deg: self.angle.degrees(),
            elapsed: started.elapsed(),
        })
    }
}

fn rate(frames: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        frames as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderCfg;
    use crate::frame::Frame;

    fn tiny_generator() -> FrameGenerator {
        FrameGenerator::new(RenderCfg {
            figure_size_in: 0.5,
            dpi: 100,
            ..RenderCfg::default()
        })
    }

    fn fast_cfg() -> AnimationCfg {
        AnimationCfg {
            step_deg: 5.0,
            frame_interval_ms: 0,
            stats_every: 0,
        }
    }

    /// Replays `script` in order (cycling), optionally stopping after `stop_after` frames.
    struct ScriptedSink {
        script: Vec<TransmitOutcome>,
        calls: usize,
        sizes: Vec<(u32, u32)>,
        stop_after: Option<(usize, StopHandle)>,
    }

    impl ScriptedSink {
        fn new(script: Vec<TransmitOutcome>) -> Self {
            Self { script, calls: 0, sizes: Vec::new(), stop_after: None }
        }
    }

    impl FrameSink for ScriptedSink {
        fn transmit(&mut self, frame: &Frame) -> Result<TransmitOutcome, EngineError> {
            let out = self.script[self.calls % self.script.len()].clone();
            self.calls += 1;
            self.sizes.push((frame.width(), frame.height()));
            if let Some((n, handle)) = &self.stop_after {
                if self.calls >= *n {
                    handle.stop();
                }
            }
            Ok(out)
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    struct BrokenSink;

    impl FrameSink for BrokenSink {
        fn transmit(&mut self, _frame: &Frame) -> Result<TransmitOutcome, EngineError> {
            Err(EngineError::Codec("boom".into()))
        }

        fn describe(&self) -> String {
            "broken".into()
        }
    }

    fn delivered() -> TransmitOutcome {
        TransmitOutcome::Delivered { bytes: 100, elapsed: Duration::ZERO }
    }
    fn not_found() -> TransmitOutcome {
        TransmitOutcome::Rejected { status: 404, bytes: 100, elapsed: Duration::ZERO }
    }
    fn refused() -> TransmitOutcome {
        TransmitOutcome::Fault { reason: "connection refused".into(), elapsed: Duration::ZERO }
    }

    #[test]
    fn angle_wraps_into_one_turn() {
        assert_eq!(AnimationAngle::from_degrees(365.0).degrees(), 5.0);
        assert_eq!(AnimationAngle::from_degrees(-5.0).degrees(), 355.0);
        assert_eq!(AnimationAngle::from_degrees(720.0).degrees(), 0.0);
        assert_eq!(AnimationAngle::from_degrees(355.0).advance(5.0).degrees(), 0.0);
    }

    #[test]
    fn seventy_two_steps_make_a_full_turn_whatever_the_network_does() {
        let sink = ScriptedSink::new(vec![delivered(), not_found(), refused()]);
        let mut fl = FrameLoop::new(tiny_generator(), sink, fast_cfg());

        for i in 0..72 {
            let report = fl.step().unwrap();
            assert_eq!(report.index, i);
            assert_eq!(report.angle_deg, (i as f64) * 5.0);
        }

        assert_eq!(fl.angle().degrees(), 0.0);
        let s = fl.stats();
        assert_eq!((s.frames, s.delivered, s.rejected, s.faulted), (72, 24, 24, 24));
        assert_eq!(s.bytes_sent, 2400);
    }

    #[test]
    fn every_frame_has_the_same_shape() {
        let sink = ScriptedSink::new(vec![delivered()]);
        let mut fl = FrameLoop::new(tiny_generator(), sink, fast_cfg());
        for _ in 0..10 {
            fl.step().unwrap();
        }
        assert!(fl.sink().sizes.iter().all(|&s| s == (50, 50)));
    }

    #[test]
    fn rejected_uploads_do_not_stop_the_loop() {
        let (handle, token) = stop_signal();
        let mut sink = ScriptedSink::new(vec![not_found()]);
        sink.stop_after = Some((5, handle));
        let mut fl = FrameLoop::new(tiny_generator(), sink, fast_cfg());

        let mut events = Vec::new();
        let summary = fl.run(&token, |e| events.push(e.clone())).unwrap();

        assert_eq!(summary.stats.frames, 5);
        assert_eq!(summary.stats.rejected, 5);
        assert_eq!(fl.state(), LoopState::Stopped);
        let rejected = events
            .iter()
            .filter(|e| matches!(e, LoopEvent::FrameRejected { status: 404, .. }))
            .count();
        assert_eq!(rejected, 5);
        assert_eq!(events.last(), Some(&LoopEvent::Stopped { frames: 5 }));
    }

    #[test]
    fn faults_do_not_stop_the_loop() {
        let (handle, token) = stop_signal();
        let mut sink = ScriptedSink::new(vec![refused(), refused(), delivered()]);
        sink.stop_after = Some((6, handle));
        let mut fl = FrameLoop::new(tiny_generator(), sink, fast_cfg());

        let summary = fl.run(&token, |_| {}).unwrap();
        assert_eq!(summary.stats.faulted, 4);
        assert_eq!(summary.stats.delivered, 2);
        assert_eq!(summary.final_angle_deg, 30.0);
    }

    #[test]
    fn stop_before_start_runs_nothing() {
        let (handle, token) = stop_signal();
        handle.stop();
        let mut fl = FrameLoop::new(tiny_generator(), ScriptedSink::new(vec![delivered()]), fast_cfg());

        let mut events = Vec::new();
        let summary = fl.run(&token, |e| events.push(e.clone())).unwrap();
        assert_eq!(summary.stats.frames, 0);
        assert_eq!(events, vec![LoopEvent::Stopped { frames: 0 }]);
    }

    #[test]
    fn stats_are_emitted_on_schedule() {
        let (handle, token) = stop_signal();
        let mut sink = ScriptedSink::new(vec![delivered()]);
        sink.stop_after = Some((7, handle));
        let cfg = AnimationCfg { stats_every: 3, ..fast_cfg() };
        let mut fl = FrameLoop::new(tiny_generator(), sink, cfg);

        let mut stats_frames = Vec::new();
        fl.run(&token, |e| {
            if let LoopEvent::Stats { stats, .. } = e {
                stats_frames.push(stats.frames);
            }
        })
        .unwrap();
        assert_eq!(stats_frames, vec![3, 6]);
    }

    #[test]
    fn sink_errors_are_fatal() {
        let (_handle, token) = stop_signal();
        let mut fl = FrameLoop::new(tiny_generator(), BrokenSink, fast_cfg());
        assert!(fl.run(&token, |_| {}).is_err());
        assert_eq!(fl.state(), LoopState::Stopped);
    }

    #[test]
    fn stop_wakes_a_long_sleep() {
        let (handle, token) = stop_signal();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.stop();
        });
        let started = Instant::now();
        assert!(token.wait(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(10));
        t.join().unwrap();
    }

    #[test]
    fn wait_times_out_without_stop() {
        let (_handle, token) = stop_signal();
        assert!(!token.wait(Duration::from_millis(5)));
        assert!(!token.is_stopped());
    }

    #[test]
    fn wait_still_sleeps_when_every_handle_is_gone() {
        let (handle, token) = stop_signal();
        drop(handle);
        let started = Instant::now();
        assert!(!token.wait(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn report_maps_to_events() {
        let r = FrameReport { index: 3, angle_deg: 15.0, outcome: not_found() };
        assert_eq!(
            r.to_event(),
            LoopEvent::FrameRejected { index: 3, angle_deg: 15.0, status: 404 }
        );
    }
}
