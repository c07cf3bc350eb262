pub mod addr;
pub mod codec;
pub mod config;
pub mod conn;
pub mod error;
pub mod frame;
pub mod mode;
pub mod poll;
pub mod protocol;
pub mod session;
pub mod shape;

#[cfg(test)]
mod mock;

pub use addr::{Endpoint, Resource};
pub use config::{ClientConfig, PollConfig};
pub use conn::{ConnError, HttpTransport, Transport};
pub use error::WireError;
pub use mode::{BallDispensingMode, CourseMode};
pub use poll::{PollingCoordinator, Stream, TelemetrySnapshot};
pub use protocol::{Command, CommandKind, CourseState, PayloadOptions};
pub use session::Session;
pub use shape::{ActuatorGrid, CourseShape, Preset, SlopeEffect};
