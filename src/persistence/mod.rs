//! Saving trained models to disk and recording versions in the registry.

mod artifact;
mod registry;

pub use artifact::ModelArtifact;
pub use registry::{JsonlRegistry, RegistryRecord, RegistrySink};
