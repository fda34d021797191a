//! Storage layer: entity rows, transactional sessions, the case mapper, and DuckDB.

mod error;
pub use error::StoreError;

pub mod details;
pub mod entity;
pub mod mapper;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
mod session;
pub mod tree;

pub use details::{DetailsImport, DetailsRow};
pub use entity::*;
pub use mapper::{PersistOutcome, persist_case};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemorySession, MemoryStore};
pub use session::{CaseSession, CaseStore};
pub use tree::{StoredAttorney, StoredCase, StoredClaim, StoredCover, StoredOab, StoredParty, StoredPerson, StoredSource};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::{CaseOverview, DuckSession, DuckStore, TABLES};
