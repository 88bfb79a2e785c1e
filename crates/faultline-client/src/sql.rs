//! Statement shapes the executor emits.
//!
//! Kept in one place so connector doubles can recognize exactly what the
//! harness sends. The schema is `kv_{i} (id BIGINT PRIMARY KEY, sk BIGINT,
//! val TEXT)` with a secondary index on `sk`; `sk` always mirrors `id`, so
//! secondary-index reads must observe the same rows as primary-key reads.

use faultline_types::LockMode;

/// Savepoint name used by the optimistic upsert path.
pub const UPSERT_SAVEPOINT: &str = "upsert";

/// Partition table for a key: deterministic, static for a run.
pub fn table_for(key: u64, tables: u32) -> String {
    format!("kv_{}", key % u64::from(tables))
}

pub fn create_table(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} \
         (id BIGINT NOT NULL PRIMARY KEY, sk BIGINT NOT NULL, val TEXT, KEY idx_sk (sk))"
    )
}

/// Read by primary key, with the lock suffix the caller decided on.
pub fn select_by_pk(table: &str, lock: LockMode) -> String {
    format!("SELECT val FROM {table} WHERE id = ?{}", lock.read_suffix())
}

/// Read through the secondary index instead.
pub fn select_by_sk(table: &str, lock: LockMode) -> String {
    format!("SELECT val FROM {table} WHERE sk = ?{}", lock.read_suffix())
}

/// Single-statement upsert for append workloads: concatenate on conflict.
/// Params: `id, sk, val, val`.
pub fn upsert_append(table: &str) -> String {
    format!(
        "INSERT INTO {table} (id, sk, val) VALUES (?, ?, ?) \
         ON DUPLICATE KEY UPDATE val = CONCAT(val, ',', ?)"
    )
}

/// Single-statement upsert for overwrite workloads: replace on conflict.
/// Params: `id, sk, val, val`.
pub fn upsert_overwrite(table: &str) -> String {
    format!(
        "INSERT INTO {table} (id, sk, val) VALUES (?, ?, ?) \
         ON DUPLICATE KEY UPDATE val = ?"
    )
}

/// Append to an existing row. Params: `val, id`.
pub fn update_append(table: &str) -> String {
    format!("UPDATE {table} SET val = CONCAT(val, ',', ?) WHERE id = ?")
}

/// Overwrite an existing row. Params: `val, id`.
pub fn update_overwrite(table: &str) -> String {
    format!("UPDATE {table} SET val = ? WHERE id = ?")
}

/// Insert a fresh row. Params: `id, sk, val`.
pub fn insert_row(table: &str) -> String {
    format!("INSERT INTO {table} (id, sk, val) VALUES (?, ?, ?)")
}

pub fn savepoint() -> String {
    format!("SAVEPOINT {UPSERT_SAVEPOINT}")
}

pub fn rollback_to_savepoint() -> String {
    format!("ROLLBACK TO SAVEPOINT {UPSERT_SAVEPOINT}")
}

pub fn release_savepoint() -> String {
    format!("RELEASE SAVEPOINT {UPSERT_SAVEPOINT}")
}
