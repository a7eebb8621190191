pub mod loader;
pub mod model;
pub mod settings;

pub use loader::*;
pub use model::*;
pub use settings::ConfigurationTable;
