//! SIGINT/SIGTERM → stop handle.
//!
//! The first signal asks the frame loop to stop at the next iteration boundary. A second
//! one while we are still winding down (e.g. stuck in an upload waiting for its timeout)
//! falls back to the default disposition and ends the process.

use fanstream_engine::StopHandle;

#[cfg(unix)]
pub fn install(handle: StopHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            let mut seen = 0u32;
            for sig in signals.forever() {
                seen += 1;
                if seen == 1 {
                    crate::logi!("SIGNAL", "{} received, stopping after the current frame", signal_name(sig));
                    handle.stop();
                } else {
                    crate::logw!("SIGNAL", "{} received again, exiting now", signal_name(sig));
                    let _ = signal_hook::low_level::emulate_default_handler(sig);
                    std::process::exit(130);
                }
            }
        })?;

    Ok(())
}

#[cfg(not(unix))]
pub fn install(_handle: StopHandle) -> anyhow::Result<()> {
    crate::logw!("SIGNAL", "signal handling unavailable on this platform; Ctrl+C terminates immediately");
    Ok(())
}

#[cfg(unix)]
fn signal_name(sig: i32) -> &'static str {
    use signal_hook::consts::{SIGINT, SIGTERM};
    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        _ => "signal",
    }
}
