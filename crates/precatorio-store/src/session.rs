//! Persistence sink abstraction: a store hands out transactional sessions.

use std::collections::HashSet;

use crate::{NewEntity, StoreError};

/// One transactional unit of work against the case tables.
///
/// Sessions are not shared: the batch orchestrator acquires a fresh one per
/// chunk and uses it sequentially.
pub trait CaseSession {
    /// Primary key of the stored case with this number, if any.
    fn find_by_case_number(&mut self, numero_cnj: &str) -> Result<Option<i64>, StoreError>;

    /// Start a transaction.
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Insert one row and return its generated primary key.
    fn insert_entity(&mut self, entity: NewEntity) -> Result<i64, StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard everything since [`begin`](Self::begin). A no-op outside a transaction.
    fn rollback(&mut self) -> Result<(), StoreError>;
}

/// A relational store keyed by CNJ number.
pub trait CaseStore {
    type Session: CaseSession;

    /// Acquire a fresh session.
    fn session(&self) -> Result<Self::Session, StoreError>;

    /// The subset of `numbers` already stored.
    fn existing_case_numbers(&self, numbers: &[String]) -> Result<HashSet<String>, StoreError>;
}
