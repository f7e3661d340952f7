use thiserror::Error;

/// Errors raised while building or solving a scheduling problem
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Rejected before any solve is attempted
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Window {window} infeasible: {reason}")]
    InfeasibleWindow { window: usize, reason: String },

    #[error("Solver unavailable: {0}")]
    SolverUnavailable(String),

    #[error("Window {window} solution incomplete: {detail}")]
    IncompleteSolution { window: usize, detail: String },

    #[error("Input error: {0}")]
    Input(String),
}

impl ScheduleError {
    pub fn config(msg: impl Into<String>) -> Self {
        ScheduleError::Configuration(msg.into())
    }

    /// Window index the error belongs to, if any
    pub fn window(&self) -> Option<usize> {
        match self {
            ScheduleError::InfeasibleWindow { window, .. }
            | ScheduleError::IncompleteSolution { window, .. } => Some(*window),
            _ => None,
        }
    }
}

impl From<csv::Error> for ScheduleError {
    fn from(err: csv::Error) -> Self {
        ScheduleError::Input(err.to_string())
    }
}

impl From<std::io::Error> for ScheduleError {
    fn from(err: std::io::Error) -> Self {
        ScheduleError::Input(err.to_string())
    }
}

pub type ScheduleResult<T> = std::result::Result<T, ScheduleError>;
