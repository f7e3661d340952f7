pub mod generator;
pub mod registry;
pub mod renewable;
pub mod schedule;
pub mod storage;
pub mod timeseries;
pub mod types;

pub use generator::*;
pub use registry::*;
pub use renewable::*;
pub use schedule::*;
pub use storage::*;
pub use timeseries::*;
pub use types::*;
