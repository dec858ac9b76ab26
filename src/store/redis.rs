use std::collections::HashMap;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{RecordStore, StoreError, Student};

/// Redis-backed record store: one hash per row, keyed `student:{name}`.
///
/// Built on a `ConnectionManager`, which is cheaply cloneable and
/// auto-reconnects — every clone shares the same multiplexed TCP
/// connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

/// Connects to Redis, exiting the process on failure. A missing store
/// at startup is one of the few fatal conditions this service has.
pub async fn connect(url: &str) -> RedisStore {
    let client = redis::Client::open(url).unwrap_or_else(|e| {
        eprintln!("invalid store URL \"{url}\": {e}");
        std::process::exit(1);
    });

    let conn = ConnectionManager::new(client).await.unwrap_or_else(|e| {
        eprintln!("cannot connect to record store at {url}: {e}");
        std::process::exit(1);
    });

    RedisStore { conn }
}

fn row_key(name: &str) -> String {
    format!("student:{name}")
}

async fn write_row(
    conn: &mut ConnectionManager,
    key: &str,
    student: &Student,
) -> Result<(), StoreError> {
    let mut cmd = redis::cmd("HSET");
    cmd.arg(key);
    for (field, value) in student.to_row() {
        cmd.arg(field).arg(value);
    }
    let _: () = cmd.query_async(conn).await?;
    Ok(())
}

impl RecordStore for RedisStore {
    async fn fetch(&self, name: &str) -> Result<Option<Student>, StoreError> {
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(row_key(name)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        Ok(Some(Student::from_row(&map)))
    }

    async fn insert(&self, student: Student) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let key = row_key(&student.name);
        let taken: bool = conn.exists(&key).await?;
        if taken {
            return Ok(false);
        }
        write_row(&mut conn, &key, &student).await?;
        Ok(true)
    }

    async fn update(&self, name: &str, student: Student) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let key = row_key(name);
        let present: bool = conn.exists(&key).await?;
        if !present {
            return Ok(false);
        }
        // A rename moves the row to its new key.
        if student.name != name {
            let _: i64 = conn.del(&key).await?;
        }
        write_row(&mut conn, &row_key(&student.name), &student).await?;
        Ok(true)
    }

    async fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(row_key(name)).await?;
        Ok(removed > 0)
    }
}
