//! Catalogue model, validator, and importer (C1-C3).

pub mod importer;
pub mod models;
pub mod records;
pub mod validation;

#[cfg(feature = "database")]
pub mod storage;

pub use importer::{CatalogueImportError, ExistingEstateState};
pub use models::Catalogue;
pub use records::CatalogueImportResult;
pub use validation::{validate_catalogue, CatalogueValidationError};

#[cfg(feature = "database")]
pub use importer::executor::CatalogueImporter;
