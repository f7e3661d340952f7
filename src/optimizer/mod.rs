pub mod constraints;
pub mod costs;
pub mod ranking;
pub mod security;
pub mod strategies;
pub mod topology;
pub mod types;
pub mod variables;

pub use constraints::*;
pub use costs::{annuity, CostModel, Economics};
pub use ranking::{rank_units, ranked_labels};
pub use strategies::*;
pub use types::*;
