pub mod schedule;
pub mod types;

pub use schedule::Planner;
pub use types::*;
