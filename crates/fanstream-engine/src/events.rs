use std::time::Duration;

use crate::driver::LoopStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Everything the frame loop reports. The engine never prints; clients decide how
/// (and whether) to log these.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// Device answered 200.
    FrameSent {
        index: u64,
        angle_deg: f64,
        bytes: usize,
        elapsed: Duration,
    },

    /// Device answered with any other status.
    FrameRejected { index: u64, angle_deg: f64, status: u16 },

    /// No answer (refused, unreachable, timed out).
    FrameFault { index: u64, angle_deg: f64, reason: String },

    /// Periodic counters plus achieved frame rate since the loop started.
    Stats { stats: LoopStats, fps: f64 },

    /// Loop left the Running state after `frames` iterations.
    Stopped { frames: u64 },
}

impl LoopEvent {
    pub fn level(&self) -> LogLevel {
        match self {
            LoopEvent::FrameSent { .. } | LoopEvent::Stats { .. } | LoopEvent::Stopped { .. } => {
                LogLevel::Info
            }
            LoopEvent::FrameRejected { .. } => LogLevel::Warn,
            LoopEvent::FrameFault { .. } => LogLevel::Error,
        }
    }
}
