pub mod argos_xml;
pub mod checkpoint;

pub use argos_xml::ConfigurationSerializer;
pub use checkpoint::{read_population, CheckpointStore, GenerationSnapshot};
