//! Battery sensor access for powerguard.
//!
//! The core only sees the [`SampleSource`] trait; [`http::HttpSampleSource`]
//! talks to the BMS board over plain HTTP, [`MockSource`] replays a script.

pub mod http;
pub mod source;

pub use source::{MockSource, Sample, SampleSource, SensorError};
