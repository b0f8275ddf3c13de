//! powerguard: watches a battery sensor and shuts the host down before the
//! pack runs flat.

pub mod alert;
pub mod config;
pub mod coordinator;
pub mod io;
pub mod runtime;
pub mod shutdown;
pub mod types;
