//! Frame generation and delivery for the holographic fan.
//!
//! - [`render`]: draws the rotating helix into a reusable offscreen surface
//! - [`codec`]: PNG encode/decode
//! - [`transmit`]: multipart HTTP upload to the device
//! - [`driver`]: the generate → transmit → sleep loop and its stop token
//! - [`config`]: `fanstream.json` discovery and typed settings
//!
//! The crate never logs. The loop reports [`events::LoopEvent`]s and the caller decides
//! what to print.

pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod frame;
pub mod render;
pub mod transmit;

pub use driver::{stop_signal, FrameLoop, StopHandle, StopToken};
pub use error::EngineError;
pub use frame::Frame;
pub use render::FrameGenerator;
pub use transmit::{FrameSink, HttpTransmitter, TransmitOutcome};
