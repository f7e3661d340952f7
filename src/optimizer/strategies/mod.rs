//! Window solver strategies
//!
//! - MILP: security-constrained unit commitment solved through `good_lp`

pub mod milp;

pub use milp::*;
