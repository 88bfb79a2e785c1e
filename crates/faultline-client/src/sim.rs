//! Deterministic in-memory stand-in for the cluster under test.
//!
//! Implements the connector boundary against a shared table store with
//! scriptable faults, so executor, classifier, and runner behavior can be
//! pinned down in tests (and by the CLI self-check) without a real cluster.
//! Isolation is not modelled — statements see committed state plus their own
//! transaction's overlay; what is under test here is the harness, not the
//! engine.

use crate::connector::{Connection, Connector, ExecResult, SqlValue, TimeoutPolicy};
use faultline_types::{DbError, Isolation, NodeId};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// A scripted fault, consumed by the next statement it applies to.
#[derive(Debug, Clone)]
pub enum Fault {
    /// The next statement (or begin/commit/rollback) fails with this error.
    Error(DbError),

    /// The first statement whose text starts with `prefix` fails with this
    /// error; statements before it run normally.
    ErrorOn { prefix: String, error: DbError },

    /// The next plain `INSERT` loses a race: the row appears, committed by
    /// a phantom concurrent writer holding `val`, and the insert itself
    /// fails with a duplicate-key error.
    DuplicateRace { val: String },
}

#[derive(Debug, Clone)]
struct SimRow {
    sk: i64,
    val: String,
}

#[derive(Debug, Default)]
struct SimState {
    tables: HashMap<String, BTreeMap<i64, SimRow>>,
    schema: HashSet<String>,
    read_only: HashSet<NodeId>,
    unreachable: HashSet<NodeId>,
    faults: VecDeque<Fault>,
    log: Vec<String>,
}

/// Handle on the simulated cluster: injection points and inspection.
#[derive(Debug, Clone, Default)]
pub struct SimCluster {
    state: Arc<Mutex<SimState>>,
}

impl SimCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector that opens connections against this cluster.
    pub fn connector(&self) -> SimConnector {
        SimConnector { state: Arc::clone(&self.state) }
    }

    /// Queues a fault for the next statement it applies to.
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    /// Marks a node as refusing writes, the way a secondary would.
    pub fn set_read_only(&self, node: &NodeId, read_only: bool) {
        let mut state = self.lock();
        if read_only {
            state.read_only.insert(node.clone());
        } else {
            state.read_only.remove(node);
        }
    }

    /// Marks a node as unreachable: opens fail at the connect deadline.
    pub fn set_unreachable(&self, node: &NodeId, unreachable: bool) {
        let mut state = self.lock();
        if unreachable {
            state.unreachable.insert(node.clone());
        } else {
            state.unreachable.remove(node);
        }
    }

    /// Committed value of a row, if present.
    pub fn committed(&self, table: &str, key: u64) -> Option<String> {
        self.lock()
            .tables
            .get(table)
            .and_then(|rows| rows.get(&(key as i64)))
            .map(|row| row.val.clone())
    }

    /// Every statement executed so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // A poisoned lock means a panicking test; propagating the panic is
        // the right response.
        self.state.lock().unwrap()
    }
}

/// Connector over a [`SimCluster`].
#[derive(Debug, Clone)]
pub struct SimConnector {
    state: Arc<Mutex<SimState>>,
}

impl Connector for SimConnector {
    type Conn = SimConnection;

    async fn open(&self, node: &NodeId, _timeouts: TimeoutPolicy) -> Result<SimConnection, DbError> {
        let state = self.state.lock().unwrap();
        if state.unreachable.contains(node) {
            return Err(DbError::Communication(format!("connect to {node}: timed out")));
        }
        Ok(SimConnection {
            node: node.clone(),
            state: Arc::clone(&self.state),
            txn: None,
        })
    }
}

#[derive(Debug, Default)]
struct TxnOverlay {
    rows: HashMap<(String, i64), SimRow>,
    savepoints: Vec<HashMap<(String, i64), SimRow>>,
}

/// One simulated connection.
#[derive(Debug)]
pub struct SimConnection {
    node: NodeId,
    state: Arc<Mutex<SimState>>,
    txn: Option<TxnOverlay>,
}

fn take_fault(state: &mut SimState, statement: &str) -> Option<Fault> {
    let fires = match state.faults.front() {
        Some(Fault::Error(_)) => true,
        Some(Fault::ErrorOn { prefix, .. }) => statement.starts_with(prefix.as_str()),
        Some(Fault::DuplicateRace { .. }) => {
            statement.starts_with("INSERT INTO") && !statement.contains("ON DUPLICATE")
        }
        None => false,
    };
    if fires { state.faults.pop_front() } else { None }
}

fn lookup(txn: &Option<TxnOverlay>, state: &SimState, table: &str, key: i64) -> Option<SimRow> {
    if let Some(txn) = txn {
        if let Some(row) = txn.rows.get(&(table.to_string(), key)) {
            return Some(row.clone());
        }
    }
    state.tables.get(table).and_then(|rows| rows.get(&key)).cloned()
}

fn store(txn: &mut Option<TxnOverlay>, state: &mut SimState, table: &str, key: i64, row: SimRow) {
    match txn {
        Some(txn) => {
            txn.rows.insert((table.to_string(), key), row);
        }
        None => {
            state.tables.entry(table.to_string()).or_default().insert(key, row);
        }
    }
}

fn check_table(state: &SimState, table: &str) -> Result<(), DbError> {
    if state.schema.contains(table) {
        Ok(())
    } else {
        Err(DbError::server(1146, format!("Table 'faultline.{table}' doesn't exist")))
    }
}

fn check_writable(node: &NodeId, state: &SimState) -> Result<(), DbError> {
    if state.read_only.contains(node) {
        Err(DbError::server(
            1290,
            "The MySQL server is running with the --read-only option so it cannot execute this statement",
        ))
    } else {
        Ok(())
    }
}

fn nth_token(statement: &str, n: usize) -> &str {
    statement.split_whitespace().nth(n).unwrap_or_default()
}

fn int_param(params: &[SqlValue], index: usize) -> i64 {
    match params.get(index) {
        Some(SqlValue::Int(n)) => *n,
        Some(SqlValue::Text(s)) => s.parse().unwrap_or_default(),
        None => 0,
    }
}

impl SimConnection {
    fn run_statement(
        &mut self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<ExecResult, DbError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let txn = &mut self.txn;
        state.log.push(statement.to_string());

        if let Some(fault) = take_fault(state, statement) {
            match fault {
                Fault::Error(error) | Fault::ErrorOn { error, .. } => return Err(error),
                Fault::DuplicateRace { val } => {
                    let table = nth_token(statement, 2).to_string();
                    let key = int_param(params, 0);
                    state
                        .tables
                        .entry(table)
                        .or_default()
                        .insert(key, SimRow { sk: key, val });
                    return Err(DbError::server(
                        1062,
                        format!("Duplicate entry '{key}' for key 'PRIMARY'"),
                    ));
                }
            }
        }

        if let Some(rest) = statement.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
            check_writable(&self.node, state)?;
            let table = rest.split_whitespace().next().unwrap_or_default().to_string();
            state.schema.insert(table.clone());
            state.tables.entry(table).or_default();
            return Ok(ExecResult::Count(0));
        }

        if statement.starts_with("ROLLBACK TO SAVEPOINT") {
            if let Some(txn) = txn {
                if let Some(snapshot) = txn.savepoints.last() {
                    txn.rows = snapshot.clone();
                }
            }
            return Ok(ExecResult::Count(0));
        }
        if statement.starts_with("RELEASE SAVEPOINT") {
            if let Some(txn) = txn {
                txn.savepoints.pop();
            }
            return Ok(ExecResult::Count(0));
        }
        if statement.starts_with("SAVEPOINT") {
            if let Some(txn) = txn {
                txn.savepoints.push(txn.rows.clone());
            }
            return Ok(ExecResult::Count(0));
        }

        if statement.starts_with("SELECT val FROM ") {
            let table = nth_token(statement, 3);
            check_table(state, table)?;
            let key = int_param(params, 0);
            // `sk` mirrors `id`, so both lookups resolve identically.
            let rows = match lookup(txn, state, table, key) {
                Some(row) => vec![vec![SqlValue::Text(row.val)]],
                None => vec![],
            };
            return Ok(ExecResult::Rows(rows));
        }

        if statement.starts_with("INSERT INTO ") {
            let table = nth_token(statement, 2).to_string();
            check_table(state, &table)?;
            check_writable(&self.node, state)?;
            let key = int_param(params, 0);
            let sk = int_param(params, 1);
            let val = params[2].as_text();
            let existing = lookup(txn, state, &table, key);
            if statement.contains("ON DUPLICATE KEY UPDATE") {
                let merged = match existing {
                    Some(row) if statement.contains("CONCAT") => {
                        SimRow { sk: row.sk, val: format!("{},{}", row.val, val) }
                    }
                    _ => SimRow { sk, val },
                };
                store(txn, state, &table, key, merged);
                return Ok(ExecResult::Count(1));
            }
            if existing.is_some() {
                return Err(DbError::server(
                    1062,
                    format!("Duplicate entry '{key}' for key 'PRIMARY'"),
                ));
            }
            store(txn, state, &table, key, SimRow { sk, val });
            return Ok(ExecResult::Count(1));
        }

        if statement.starts_with("UPDATE ") {
            let table = nth_token(statement, 1).to_string();
            check_table(state, &table)?;
            check_writable(&self.node, state)?;
            let val = params[0].as_text();
            let key = int_param(params, 1);
            return match lookup(txn, state, &table, key) {
                Some(row) => {
                    let merged = if statement.contains("CONCAT") {
                        SimRow { sk: row.sk, val: format!("{},{}", row.val, val) }
                    } else {
                        SimRow { sk: row.sk, val }
                    };
                    store(txn, state, &table, key, merged);
                    Ok(ExecResult::Count(1))
                }
                None => Ok(ExecResult::Count(0)),
            };
        }

        Err(DbError::server(1064, format!("You have an error in your SQL syntax: {statement}")))
    }

    fn run_control(&mut self, label: &str) -> Result<(), DbError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.log.push(label.to_string());
        match take_fault(state, label) {
            Some(Fault::Error(error) | Fault::ErrorOn { error, .. }) => {
                // The fault decides the transaction's fate; the overlay is
                // dropped either way.
                self.txn = None;
                Err(error)
            }
            _ => Ok(()),
        }
    }
}

impl Connection for SimConnection {
    async fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<ExecResult, DbError> {
        self.run_statement(statement, params)
    }

    async fn begin(&mut self, isolation: Isolation) -> Result<(), DbError> {
        self.run_control(&format!("BEGIN {}", isolation.as_sql()))?;
        self.txn = Some(TxnOverlay::default());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.run_control("COMMIT")?;
        if let Some(txn) = self.txn.take() {
            let mut state = self.state.lock().unwrap();
            for ((table, key), row) in txn.rows {
                state.tables.entry(table).or_default().insert(key, row);
            }
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.run_control("ROLLBACK")?;
        self.txn = None;
        Ok(())
    }
}
