pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod optimizer;
pub mod scenario;
pub mod telemetry;

pub use error::{ScheduleError, ScheduleResult};
