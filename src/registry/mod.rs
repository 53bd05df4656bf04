//! Registry synchroniser (C4): projects catalogue repositories into the
//! operational Silver mirror and manages ingestion toggles.

pub mod errors;
pub mod models;
pub mod sync;

#[cfg(feature = "database")]
pub mod service;
#[cfg(feature = "database")]
pub mod storage;

pub use errors::{NegativePaginationError, RegistryError, RegistrySyncError, RepositoryNotFoundError};
pub use models::{parse_slug, RepositoryInfo, RepositoryListOptions, SilverRepository, SyncResult};

#[cfg(feature = "database")]
pub use service::RegistryService;
