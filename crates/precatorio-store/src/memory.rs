//! In-memory [`CaseStore`] for tests.
//!
//! Sessions buffer their inserts and publish them to the shared state on
//! commit, so a rolled-back record leaves nothing behind. Individual case
//! numbers can be marked to fail partway through their tree.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{CaseSession, CaseStore, NewCase, NewEntity, StoreError};

#[derive(Debug, Default)]
struct State {
    rows: Vec<(i64, NewEntity)>,
    next_id: i64,
    failing: HashSet<String>,
    sessions_opened: usize,
    commits: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every insert after this case's root row fail.
    pub fn fail_case(&self, numero_cnj: &str) {
        self.lock().failing.insert(numero_cnj.to_string());
    }

    /// Seed a committed case row and return its id.
    pub fn seed_case(&self, numero_cnj: &str) -> i64 {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.rows.push((
            id,
            NewEntity::Case(NewCase {
                numero_cnj: numero_cnj.to_string(),
                ..Default::default()
            }),
        ));
        id
    }

    /// Committed case numbers in commit order.
    pub fn case_numbers(&self) -> Vec<String> {
        self.cases().into_iter().map(|c| c.numero_cnj).collect()
    }

    pub fn cases(&self) -> Vec<NewCase> {
        self.lock()
            .rows
            .iter()
            .filter_map(|(_, e)| match e {
                NewEntity::Case(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    /// Committed rows of one table.
    pub fn rows_of(&self, table: &str) -> Vec<NewEntity> {
        self.lock()
            .rows
            .iter()
            .filter(|(_, e)| e.table() == table)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn count(&self, table: &str) -> usize {
        self.lock().rows.iter().filter(|(_, e)| e.table() == table).count()
    }

    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions_opened
    }

    pub fn commits(&self) -> usize {
        self.lock().commits
    }
}

impl CaseStore for MemoryStore {
    type Session = MemorySession;

    fn session(&self) -> Result<MemorySession, StoreError> {
        self.lock().sessions_opened += 1;
        Ok(MemorySession {
            store: self.clone(),
            pending: None,
            poisoned: false,
        })
    }

    fn existing_case_numbers(&self, numbers: &[String]) -> Result<HashSet<String>, StoreError> {
        let wanted: HashSet<&str> = numbers.iter().map(String::as_str).collect();
        Ok(self
            .case_numbers()
            .into_iter()
            .filter(|n| wanted.contains(n.as_str()))
            .collect())
    }
}

#[derive(Debug)]
pub struct MemorySession {
    store: MemoryStore,
    pending: Option<Vec<(i64, NewEntity)>>,
    poisoned: bool,
}

impl CaseSession for MemorySession {
    fn find_by_case_number(&mut self, numero_cnj: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.store.lock().rows.iter().find_map(|(id, e)| match e {
            NewEntity::Case(c) if c.numero_cnj == numero_cnj => Some(*id),
            _ => None,
        }))
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        if self.pending.is_some() {
            return Err(StoreError::Other("transaction already open".into()));
        }
        self.pending = Some(Vec::new());
        self.poisoned = false;
        Ok(())
    }

    fn insert_entity(&mut self, entity: NewEntity) -> Result<i64, StoreError> {
        if self.poisoned {
            return Err(StoreError::Other(format!(
                "injected failure inserting into {}",
                entity.table()
            )));
        }
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| StoreError::Other("insert outside a transaction".into()))?;

        let mut state = self.store.lock();
        if let NewEntity::Case(case) = &entity {
            let duplicate = state
                .rows
                .iter()
                .chain(pending.iter())
                .any(|(_, e)| matches!(e, NewEntity::Case(c) if c.numero_cnj == case.numero_cnj));
            if duplicate {
                return Err(StoreError::Other(format!(
                    "duplicate numero_cnj {}",
                    case.numero_cnj
                )));
            }
            self.poisoned = state.failing.contains(&case.numero_cnj);
        }
        state.next_id += 1;
        let id = state.next_id;
        pending.push((id, entity));
        Ok(id)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| StoreError::Other("commit outside a transaction".into()))?;
        if self.poisoned {
            self.poisoned = false;
            return Err(StoreError::Other("injected failure on commit".into()));
        }
        let mut state = self.store.lock();
        state.rows.extend(pending);
        state.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.pending = None;
        self.poisoned = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewRelatedCase;

    #[test]
    fn rollback_discards_pending_rows() {
        let store = MemoryStore::default();
        let mut session = store.session().unwrap();
        session.begin().unwrap();
        session
            .insert_entity(NewEntity::Case(NewCase {
                numero_cnj: "X".into(),
                ..Default::default()
            }))
            .unwrap();
        session.rollback().unwrap();
        assert_eq!(store.count("processos"), 0);
        assert_eq!(store.commits(), 0);
    }

    #[test]
    fn failing_case_breaks_after_root_row() {
        let store = MemoryStore::default();
        store.fail_case("Y");
        let mut session = store.session().unwrap();
        session.begin().unwrap();
        let id = session
            .insert_entity(NewEntity::Case(NewCase {
                numero_cnj: "Y".into(),
                ..Default::default()
            }))
            .unwrap();
        let child = session.insert_entity(NewEntity::RelatedCase(NewRelatedCase {
            processo_id: id,
            numero: None,
        }));
        assert!(child.is_err());
    }

    #[test]
    fn seeded_cases_are_reported_existing() {
        let store = MemoryStore::default();
        store.seed_case("A");
        let existing = store
            .existing_case_numbers(&["A".to_string(), "B".to_string()])
            .unwrap();
        assert_eq!(existing, HashSet::from(["A".to_string()]));
    }
}
