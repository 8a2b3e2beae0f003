#![doc = include_str!("../README.md")]

mod error;
mod gauge;
mod line;
mod publisher;
mod throttle;
mod transport;

pub use error::Error;
pub use gauge::{CyclingGauge, Timestamps};
pub use line::Series;
pub use publisher::{Builder, DEFAULT_URL, Outcome, Publisher, RunState, RunSummary};
pub use throttle::LogThrottle;
pub use transport::{CONTENT_TYPE, HttpTransport, SendError, Transport, UdpTransport};
