//! Verifiable presentation generation.
//!
//! Credentials are grouped by [CredentialFormat](crate::core::credential::CredentialFormat) and
//! each group is packaged by the [PresentationGenerator] registered for its format.

pub mod enveloped;
pub mod generator;
pub mod jwt;
pub mod ldp;
pub mod packager;
pub mod registry;

pub use generator::{Presentation, PresentationGenerator};
pub use packager::{PresentationPackager, PresentationResponse};
pub use registry::{PresentationCreatorRegistry, PresentationCreatorRegistryBuilder};
