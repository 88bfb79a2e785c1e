//! Executes one transaction's micro-operations against a connection.
//!
//! The executor owns the interesting client-side behavior: deterministic
//! partitioning, lock-aware reads, the two write strategies, randomized
//! inter-operation delays that widen race windows, and injected aborts. It
//! finishes every attempt by resolving to exactly one [`Outcome`] — or by
//! propagating the two failures that must never become outcomes.

use crate::classify::{Classification, classify};
use crate::connector::{Connection, ExecResult, SqlValue};
use crate::error::ExecutorError;
use crate::sql;
use faultline_types::{
    DbError, ErrorReason, Isolation, LockMode, MicroOp, Outcome, Transaction, Value, WriteStrategy,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

/// Per-run knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Number of partition tables.
    pub tables: u32,

    /// Isolation level for multi-operation transactions.
    pub isolation: Isolation,

    /// Probability that a read goes through the secondary index.
    pub secondary_read_probability: f64,

    /// Lock applied to reads whose key is written later in the same
    /// transaction.
    pub lock_mode: LockMode,

    /// Strategies the executor may choose among, uniformly per write.
    pub write_strategies: Vec<WriteStrategy>,

    /// Probability that a multi-operation transaction aborts itself after
    /// its last micro-operation.
    pub abort_probability: f64,

    /// Mean of the exponential inter-operation delay, in milliseconds.
    pub delay_mean_ms: f64,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            tables: 5,
            isolation: Isolation::RepeatableRead,
            secondary_read_probability: 0.2,
            lock_mode: LockMode::None,
            write_strategies: vec![WriteStrategy::AtomicUpsert, WriteStrategy::OptimisticUpsert],
            abort_probability: 0.02,
            delay_mean_ms: 5.0,
        }
    }
}

/// Error channel inside one transaction body.
enum BodyError {
    Db(DbError),
    Invariant { table: String, key: u64 },
}

impl From<DbError> for BodyError {
    fn from(error: DbError) -> Self {
        Self::Db(error)
    }
}

/// Runs transactions against connections, one attempt at a time.
pub struct Executor {
    opts: ExecOptions,
    rng: StdRng,
}

impl Executor {
    /// An executor seeded for reproducibility.
    pub fn new(opts: ExecOptions, seed: u64) -> Self {
        Self { opts, rng: StdRng::seed_from_u64(seed) }
    }

    pub fn options(&self) -> &ExecOptions {
        &self.opts
    }

    /// Executes one transaction and resolves it to an outcome.
    ///
    /// Transactions with more than one micro-operation are wrapped in a
    /// database transaction at the configured isolation level; single
    /// operations execute bare. Recognized failures become `Fail`/`Info`
    /// outcomes; an exhausted optimistic upsert or an unrecognized database
    /// error aborts the run instead.
    pub async fn apply<C: Connection>(
        &mut self,
        conn: &mut C,
        ops: Transaction,
    ) -> Result<Outcome, ExecutorError> {
        let wrapped = ops.len() > 1;
        if wrapped {
            if let Err(e) = conn.begin(self.opts.isolation).await {
                return resolve(e).await;
            }
        }

        let mut ops = ops;
        match self.run_body(conn, &mut ops, wrapped).await {
            Ok(()) => {
                if wrapped {
                    if let Err(e) = conn.commit().await {
                        return resolve_commit(e).await;
                    }
                }
                Ok(Outcome::Ok { ops })
            }
            Err(BodyError::Db(e)) => {
                if wrapped {
                    // Best effort: the classification of the original error
                    // decides the outcome either way.
                    let _ = conn.rollback().await;
                }
                resolve(e).await
            }
            Err(BodyError::Invariant { table, key }) => {
                if wrapped {
                    let _ = conn.rollback().await;
                }
                Err(ExecutorError::InvariantViolation { table, key })
            }
        }
    }

    async fn run_body<C: Connection>(
        &mut self,
        conn: &mut C,
        ops: &mut [MicroOp],
        wrapped: bool,
    ) -> Result<(), BodyError> {
        for i in 0..ops.len() {
            if wrapped && i > 0 {
                self.inter_op_delay().await;
            }
            let Some((current, rest)) = ops[i..].split_first_mut() else {
                break;
            };
            match current {
                MicroOp::Read { key, value } => {
                    // Look ahead: a later write of the same key in this
                    // transaction turns the read into a locking read.
                    let locks = rest.iter().any(|op| op.is_write() && op.key() == *key);
                    let lock = if locks { self.opts.lock_mode } else { LockMode::None };
                    *value = self.read(conn, *key, lock).await?;
                }
                MicroOp::Append { key, value } => {
                    let (key, value) = (*key, *value);
                    self.write(conn, key, value, true).await?;
                }
                MicroOp::Write { key, value } => {
                    let (key, value) = (*key, *value);
                    self.write(conn, key, value, false).await?;
                }
            }
        }
        // Inside the wrapping transaction, so the rollback makes the abort
        // a true non-event.
        if wrapped && self.rng.r#gen::<f64>() < self.opts.abort_probability {
            return Err(DbError::InjectedAbort.into());
        }
        Ok(())
    }

    async fn read<C: Connection>(
        &mut self,
        conn: &mut C,
        key: u64,
        lock: LockMode,
    ) -> Result<Option<Value>, BodyError> {
        let table = sql::table_for(key, self.opts.tables);
        let by_secondary = self.rng.r#gen::<f64>() < self.opts.secondary_read_probability;
        let statement = if by_secondary {
            sql::select_by_sk(&table, lock)
        } else {
            sql::select_by_pk(&table, lock)
        };
        let result = conn.execute(&statement, &[SqlValue::Int(key as i64)]).await?;
        let rows = match result {
            ExecResult::Rows(rows) => rows,
            ExecResult::Count(_) => vec![],
        };
        Ok(rows
            .first()
            .and_then(|row| row.first())
            .map(|cell| parse_stored(&cell.as_text())))
    }

    async fn write<C: Connection>(
        &mut self,
        conn: &mut C,
        key: u64,
        value: i64,
        append: bool,
    ) -> Result<(), BodyError> {
        let table = sql::table_for(key, self.opts.tables);
        match self.pick_strategy() {
            WriteStrategy::AtomicUpsert => {
                let statement =
                    if append { sql::upsert_append(&table) } else { sql::upsert_overwrite(&table) };
                let val = SqlValue::Text(value.to_string());
                conn.execute(
                    &statement,
                    &[SqlValue::Int(key as i64), SqlValue::Int(key as i64), val.clone(), val],
                )
                .await?;
                Ok(())
            }
            WriteStrategy::OptimisticUpsert => {
                self.optimistic_upsert(conn, &table, key, value, append).await
            }
        }
    }

    /// Update-then-insert with one retry.
    ///
    /// The insert runs under a savepoint so a duplicate-key race (another
    /// transaction created the row between our update and our insert) can
    /// be rolled back without poisoning the surrounding transaction. If the
    /// retried update still matches nothing, the row is neither present nor
    /// absent — unreachable under correct engine semantics, and reported as
    /// such rather than swallowed.
    async fn optimistic_upsert<C: Connection>(
        &mut self,
        conn: &mut C,
        table: &str,
        key: u64,
        value: i64,
        append: bool,
    ) -> Result<(), BodyError> {
        let update = if append { sql::update_append(table) } else { sql::update_overwrite(table) };
        let params = [SqlValue::Text(value.to_string()), SqlValue::Int(key as i64)];
        if conn.execute(&update, &params).await?.count() > 0 {
            return Ok(());
        }

        conn.execute(&sql::savepoint(), &[]).await?;
        let insert = conn
            .execute(
                &sql::insert_row(table),
                &[
                    SqlValue::Int(key as i64),
                    SqlValue::Int(key as i64),
                    SqlValue::Text(value.to_string()),
                ],
            )
            .await;
        match insert {
            Ok(_) => {
                conn.execute(&sql::release_savepoint(), &[]).await?;
                Ok(())
            }
            Err(e) if e.is_duplicate_key() => {
                conn.execute(&sql::rollback_to_savepoint(), &[]).await?;
                if conn.execute(&update, &params).await?.count() > 0 {
                    Ok(())
                } else {
                    error!(table, key, "upsert retry exhausted: row neither updatable nor insertable");
                    Err(BodyError::Invariant { table: table.to_string(), key })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn pick_strategy(&mut self) -> WriteStrategy {
        let strategies = &self.opts.write_strategies;
        strategies[self.rng.gen_range(0..strategies.len())]
    }

    /// Exponentially distributed pause between micro-operations.
    async fn inter_op_delay(&mut self) {
        if self.opts.delay_mean_ms <= 0.0 {
            return;
        }
        let u: f64 = self.rng.r#gen();
        let ms = -self.opts.delay_mean_ms * (1.0 - u).ln();
        sleep(Duration::from_secs_f64(ms / 1000.0)).await;
    }

}

/// Resolves a raw error from statement execution or connect into an
/// outcome, or propagates it if the classifier does not recognize it.
pub(crate) async fn resolve(error: DbError) -> Result<Outcome, ExecutorError> {
    match classify(&error) {
        Classification::Fail(reason) => Ok(Outcome::Fail { reason }),
        Classification::FailAfterBackoff(reason, pause) => {
            sleep(pause).await;
            Ok(Outcome::Fail { reason })
        }
        Classification::Info(reason) => Ok(Outcome::Info { reason }),
        Classification::Unknown => {
            warn!(%error, "unrecognized database error, propagating");
            Err(error.into())
        }
    }
}

/// Commit-phase variant of [`resolve`]: any communication-shaped loss
/// during commit leaves the transaction's fate unknown, so it resolves to
/// `Info` even where the same error mid-statement would have been a
/// definite `Fail`.
async fn resolve_commit(error: DbError) -> Result<Outcome, ExecutorError> {
    match classify(&error) {
        Classification::Fail(ErrorReason::Communication) | Classification::Info(_) => {
            Ok(Outcome::Info { reason: ErrorReason::Indeterminate })
        }
        Classification::Fail(reason) => Ok(Outcome::Fail { reason }),
        Classification::FailAfterBackoff(reason, pause) => {
            sleep(pause).await;
            Ok(Outcome::Fail { reason })
        }
        Classification::Unknown => {
            warn!(%error, "unrecognized database error at commit, propagating");
            Err(error.into())
        }
    }
}

/// Interprets a stored TEXT cell.
///
/// Append workloads store comma-joined lists, overwrite workloads store a
/// single scalar; a one-element list is indistinguishable from a scalar in
/// storage, so it parses as `Int` and list-append analysis treats `Int` as
/// a singleton.
fn parse_stored(text: &str) -> Value {
    if text.contains(',') {
        Value::List(text.split(',').filter_map(|part| part.parse().ok()).collect())
    } else {
        match text.parse() {
            Ok(n) => Value::Int(n),
            Err(_) => Value::List(vec![]),
        }
    }
}
