//! fanstream: render a rotating helix and stream it to a holographic LED fan.
//!
//! Runs until SIGINT/SIGTERM. Settings come from `fanstream.json` when one is found
//! (see `fanstream_engine::config`), otherwise from built-in defaults.
//!
//! Environment:
//! - `FANSTREAM_CONFIG`        explicit config path
//! - `FANSTREAM_URL`           override the device base URL
//! - `FANSTREAM_STRICT_CONFIG` `1` to reject unknown config keys
//! - `FANSTREAM_LOG_FILE`      also append log lines to this file

mod interrupt;
mod logging;
mod validate;

use anyhow::{bail, Context};

use fanstream_engine::config::{load_stream_config_from, ConfigMode, ConfigSource, StreamConfig};
use fanstream_engine::events::{LogLevel, LoopEvent};
use fanstream_engine::{stop_signal, FrameGenerator, FrameLoop, FrameSink, HttpTransmitter};

const STRICT_ENV: &str = "FANSTREAM_STRICT_CONFIG";

fn config_mode_from_env() -> ConfigMode {
    match std::env::var(STRICT_ENV) {
        Ok(v) if matches!(v.trim(), "1" | "true" | "yes") => ConfigMode::Strict,
        _ => ConfigMode::Lenient,
    }
}

fn load_config() -> anyhow::Result<StreamConfig> {
    let mode = config_mode_from_env();
    let cwd = std::env::current_dir().context("reading working directory")?;
    let loaded = load_stream_config_from(&cwd, mode).context("loading fanstream config")?;

    match &loaded.source {
        ConfigSource::File(p) => logi!("CONFIG", "loaded {} ({:?})", p.display(), mode),
        ConfigSource::Defaults => logi!("CONFIG", "no fanstream.json found, using built-in defaults"),
    }

    let issues = validate::validate_stream_config(&loaded.config, loaded.value.as_ref());
    validate::emit_issues("CONFIG", &issues);
    validate::emit_summary("CONFIG", "fanstream.json", &issues);
    if validate::error_count(&issues) > 0 {
        bail!("configuration has errors, refusing to start");
    }

    Ok(loaded.config)
}

fn report(event: &LoopEvent) {
    let line = match event {
        LoopEvent::FrameSent { index, angle_deg, bytes, elapsed } => format!(
            "frame #{index} @ {angle_deg:.0}° sent successfully ({bytes} B in {:.1} ms)",
            elapsed.as_secs_f64() * 1000.0
        ),
        LoopEvent::FrameRejected { index, angle_deg, status } => {
            format!("frame #{index} @ {angle_deg:.0}° failed to send: status {status}")
        }
        LoopEvent::FrameFault { index, angle_deg, reason } => {
            format!("frame #{index} @ {angle_deg:.0}° error sending frame: {reason}")
        }
        LoopEvent::Stats { stats, fps } => {
            logi!(
                "STATS",
                "frames={} ok={} rejected={} faults={} sent={} KiB fps={:.2}",
                stats.frames,
                stats.delivered,
                stats.rejected,
                stats.faulted,
                stats.bytes_sent / 1024,
                fps
            );
            return;
        }
        LoopEvent::Stopped { frames } => {
            logi!("STREAM", "streaming stopped by user after {frames} frames");
            return;
        }
    };

    match event.level() {
        LogLevel::Info => logi!("TX", "{line}"),
        LogLevel::Warn => logw!("TX", "{line}"),
        LogLevel::Error => loge!("TX", "{line}"),
    }
}

fn run() -> anyhow::Result<()> {
    let cfg = load_config()?;

    let (handle, token) = stop_signal();
    interrupt::install(handle).context("installing signal handlers")?;

    let generator = FrameGenerator::new(cfg.render.clone());
    let (w, h) = generator.frame_size();
    logi!(
        "STREAM",
        "scene: helix x{} samples, elev {}°, step {}°/frame, {}x{} px, sleep {} ms",
        cfg.render.samples,
        cfg.render.elevation_deg,
        cfg.animation.step_deg,
        w,
        h,
        cfg.animation.frame_interval_ms
    );

    let transmitter = HttpTransmitter::new(&cfg.endpoint).context("building HTTP client")?;
    logi!(
        "STREAM",
        "starting real-time streaming: {} (timeout {} ms)",
        transmitter.describe(),
        cfg.endpoint.timeout_ms
    );

    let mut frame_loop = FrameLoop::new(generator, transmitter, cfg.animation.clone());
    let summary = frame_loop.run(&token, report).context("frame loop aborted")?;

    logi!(
        "STREAM",
        "done: {} frames in {:.1}s ({} delivered, {} rejected, {} faults), last angle {:.0}°",
        summary.stats.frames,
        summary.elapsed.as_secs_f64(),
        summary.stats.delivered,
        summary.stats.rejected,
        summary.stats.faulted,
        summary.final_angle_deg
    );
    Ok(())
}

fn main() {
    let run_id = logging::init(logging::log_file_from_env());
    logi!("STREAM", "fanstream {} (run_id={})", env!("CARGO_PKG_VERSION"), run_id);

    if let Err(e) = run() {
        loge!("STREAM", "fatal: {e:#}");
        std::process::exit(1);
    }
}
