pub mod traits;
pub mod run;
pub mod manager;

pub use manager::ConfigManager;
pub use run::{Platform, RunConfig};
pub use traits::ConfigSection;
