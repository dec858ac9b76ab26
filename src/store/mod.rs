pub mod mem;
pub mod redis;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

// ─── Row type ────────────────────────────────────────────────────

/// One row of the student table. The `name` column is the unique key;
/// every other column is free-form text, exactly as the upstream sheet
/// stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub commute_method: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub hobbies: String,
}

impl Student {
    /// Flatten into (column, value) pairs for a row write.
    pub fn to_row(&self) -> [(&'static str, &str); 5] {
        [
            ("name", &self.name),
            ("age", &self.age),
            ("commute_method", &self.commute_method),
            ("college", &self.college),
            ("hobbies", &self.hobbies),
        ]
    }

    /// Rebuild a row fetched as a column → value map. Missing columns
    /// come back as empty strings, matching how a sparse sheet row reads.
    pub fn from_row(map: &HashMap<String, String>) -> Self {
        let col = |f: &str| map.get(f).cloned().unwrap_or_default();
        Self {
            name: col("name"),
            age: col("age"),
            commute_method: col("commute_method"),
            college: col("college"),
            hobbies: col("hobbies"),
        }
    }
}

// ─── Store abstraction ───────────────────────────────────────────

/// Narrow interface to the external tabular record store.
///
/// The service is a thin pass-through: the only invariant the store
/// carries is that a row is identified by its unique `name` field.
/// The `bool` results report whether the named row existed (or, for
/// `insert`, whether the name was free); `StoreError` is reserved for
/// backend failures.
pub trait RecordStore: Send + Sync + 'static {
    /// Look up a row by name.
    fn fetch(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Student>, StoreError>> + Send;

    /// Append a new row. Returns `false` without writing when a row
    /// with the same name already exists.
    fn insert(
        &self,
        student: Student,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Rewrite the row currently stored under `name` with the given
    /// record (which may carry a different name, renaming the row).
    /// Returns `false` when no such row exists.
    fn update(
        &self,
        name: &str,
        student: Student,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Delete the row stored under `name`. Returns `false` when no
    /// such row exists.
    fn remove(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

// ─── Error type ──────────────────────────────────────────────────

/// A failure talking to the store backend.
#[derive(Debug)]
pub struct StoreError(String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StoreError {}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        Self(err.to_string())
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_mapping_preserves_every_column() {
        let student = Student {
            name: "Ada".into(),
            age: "23".into(),
            commute_method: "bike".into(),
            college: "Engineering".into(),
            hobbies: "chess".into(),
        };

        let map: HashMap<String, String> = student
            .to_row()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert_eq!(Student::from_row(&map), student);
    }

    #[test]
    fn missing_columns_read_as_empty() {
        let mut map = HashMap::new();
        map.insert("name".to_string(), "Ada".to_string());

        let student = Student::from_row(&map);
        assert_eq!(student.name, "Ada");
        assert_eq!(student.age, "");
        assert_eq!(student.hobbies, "");
    }
}
