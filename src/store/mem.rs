use std::collections::HashMap;

use parking_lot::Mutex;

use super::{RecordStore, StoreError, Student};

/// In-memory record store.
///
/// Keeps all rows in a `HashMap` keyed by student name. Used by the
/// test suite and by `REDIS_URL=mem` for running the service without
/// a backend; rows do not survive a restart.
#[derive(Default)]
pub struct MemStore {
    rows: Mutex<HashMap<String, Student>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemStore {
    async fn fetch(&self, name: &str) -> Result<Option<Student>, StoreError> {
        Ok(self.rows.lock().get(name).cloned())
    }

    async fn insert(&self, student: Student) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock();
        if rows.contains_key(&student.name) {
            return Ok(false);
        }
        rows.insert(student.name.clone(), student);
        Ok(true)
    }

    async fn update(&self, name: &str, student: Student) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock();
        if rows.remove(name).is_none() {
            return Ok(false);
        }
        rows.insert(student.name.clone(), student);
        Ok(true)
    }

    async fn remove(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.rows.lock().remove(name).is_some())
    }
}
