//! Activity Worker
//!
//! Runtime that claims tasks from an orchestrator queue, runs a pluggable
//! [`Activity`] on each one and reports the outcome.
//!
//! # Features
//! - One in-flight task per process; scale out by running more processes
//! - Background heartbeat daemon that ends the process once liveness for the
//!   current task can no longer be proven
//! - Termination signals reported as task failures before exit
//! - Activity errors and panics reported with their error chain and backtrace

pub mod activity;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod signals;
pub mod state;
pub mod telemetry;
pub mod worker;

pub use activity::{Activity, EchoActivity, SleepActivity};
pub use config::WorkerConfig;
pub use error::WorkerError;
pub use heartbeat::HeartbeatDaemon;
pub use signals::TerminationSignals;
pub use state::WorkerState;
pub use worker::ActivityWorker;
