mod countdown;
mod loop_control;
pub mod poll_loop;
mod scheduler;
mod signals;

pub use countdown::CountdownTicker;
pub use loop_control::PollMode;
pub use scheduler::{RunOutcome, Runtime, TICK_PERIOD};
pub use signals::SignalGuard;
pub use crate::types::GuardStatus;
