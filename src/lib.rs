//! Core of a voice-interaction device.
//!
//! # Layout
//!
//! * [`scheduler`]: the main-loop event group and the work queues.
//! * [`device`]: device states and the transition rules.
//! * [`audio`]: frame codec seams, resampling and bundled alert sounds.
//! * [`application`]: the session orchestrator that ties it together.
//! * [`board`], [`protocol`], [`voice`], [`iot`], [`ota`]: the seams to
//!   hardware, the remote session, voice analysis, IoT things and the
//!   update server.
//! * [`config`]: TOML settings.
//! * [`sim`]: in-process fakes of every seam for host runs and tests.

pub mod application;
pub mod audio;
pub mod board;
pub mod config;
pub mod device;
pub mod iot;
pub mod ota;
pub mod protocol;
pub mod scheduler;
pub mod sim;
pub mod voice;

pub use application::{AppError, Application, DeviceContext};
pub use config::DeviceConfig;
pub use device::DeviceState;
