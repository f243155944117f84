//! Local in-memory projection of replicated rows.
//!
//! Readers see speculative patches immediately; the coordinator keeps the
//! captured undo record and reverts it if the write is rejected, times out,
//! or is cancelled.

use std::collections::HashMap;
use std::sync::RwLock;

use wakeline_domain::Table;

/// A speculative change to one row of the local projection.
#[derive(Debug, Clone)]
pub struct LocalPatch {
    /// Table the row belongs to
    pub table: Table,
    /// Row key within the table
    pub row_id: String,
    /// What to do to the row
    pub op: PatchOp,
}

/// Row-level patch operation.
#[derive(Debug, Clone)]
pub enum PatchOp {
    /// Insert or replace the row
    Put(serde_json::Value),
    /// Remove the row
    Remove,
}

impl LocalPatch {
    /// Insert or replace a row.
    pub fn put(table: Table, row_id: impl Into<String>, row: serde_json::Value) -> Self {
        Self { table, row_id: row_id.into(), op: PatchOp::Put(row) }
    }

    /// Remove a row.
    pub fn remove(table: Table, row_id: impl Into<String>) -> Self {
        Self { table, row_id: row_id.into(), op: PatchOp::Remove }
    }
}

/// Undo record captured when a patch is applied.
///
/// Reverting restores the exact prior row state: the previous value if the
/// row existed, absence if it did not.
#[derive(Debug)]
pub struct UndoPatch {
    table: Table,
    row_id: String,
    prior: Option<serde_json::Value>,
}

/// Thread-safe in-memory row store keyed by table and row id.
pub struct LocalProjection {
    tables: RwLock<HashMap<Table, HashMap<String, serde_json::Value>>>,
}

impl LocalProjection {
    /// Create an empty projection.
    pub fn new() -> Self {
        Self { tables: RwLock::new(HashMap::new()) }
    }

    /// Read a row.
    pub fn get(&self, table: Table, row_id: &str) -> Option<serde_json::Value> {
        self.tables
            .read()
            .expect("projection lock poisoned")
            .get(&table)
            .and_then(|rows| rows.get(row_id))
            .cloned()
    }

    /// Number of rows currently held for a table.
    pub fn row_count(&self, table: Table) -> usize {
        self.tables
            .read()
            .expect("projection lock poisoned")
            .get(&table)
            .map_or(0, |rows| rows.len())
    }

    /// Apply a patch, returning the undo record for a possible revert.
    pub fn apply(&self, patch: &LocalPatch) -> UndoPatch {
        let mut tables = self.tables.write().expect("projection lock poisoned");
        let rows = tables.entry(patch.table).or_default();

        let prior = match &patch.op {
            PatchOp::Put(row) => rows.insert(patch.row_id.clone(), row.clone()),
            PatchOp::Remove => rows.remove(&patch.row_id),
        };

        UndoPatch { table: patch.table, row_id: patch.row_id.clone(), prior }
    }

    /// Revert a previously applied patch.
    pub fn revert(&self, undo: UndoPatch) {
        let mut tables = self.tables.write().expect("projection lock poisoned");
        let rows = tables.entry(undo.table).or_default();

        match undo.prior {
            Some(prior) => {
                rows.insert(undo.row_id, prior);
            }
            None => {
                rows.remove(&undo.row_id);
            }
        }
    }
}

impl Default for LocalProjection {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_then_revert_removes_new_row() {
        let projection = LocalProjection::new();
        let patch = LocalPatch::put(Table::Messages, "m1", json!({"body": "hi"}));

        let undo = projection.apply(&patch);
        assert_eq!(projection.get(Table::Messages, "m1").unwrap()["body"], "hi");

        projection.revert(undo);
        assert!(projection.get(Table::Messages, "m1").is_none());
    }

    #[test]
    fn test_put_then_revert_restores_prior_value() {
        let projection = LocalProjection::new();
        projection.apply(&LocalPatch::put(Table::Messages, "m1", json!({"body": "old"})));

        let undo =
            projection.apply(&LocalPatch::put(Table::Messages, "m1", json!({"body": "new"})));
        assert_eq!(projection.get(Table::Messages, "m1").unwrap()["body"], "new");

        projection.revert(undo);
        assert_eq!(projection.get(Table::Messages, "m1").unwrap()["body"], "old");
    }

    #[test]
    fn test_remove_then_revert_restores_row() {
        let projection = LocalProjection::new();
        projection.apply(&LocalPatch::put(Table::Reactions, "r1", json!({"emoji": "+1"})));

        let undo = projection.apply(&LocalPatch::remove(Table::Reactions, "r1"));
        assert!(projection.get(Table::Reactions, "r1").is_none());

        projection.revert(undo);
        assert_eq!(projection.get(Table::Reactions, "r1").unwrap()["emoji"], "+1");
    }

    #[test]
    fn test_tables_are_isolated() {
        let projection = LocalProjection::new();
        projection.apply(&LocalPatch::put(Table::Messages, "1", json!({})));

        assert_eq!(projection.row_count(Table::Messages), 1);
        assert_eq!(projection.row_count(Table::Channels), 0);
        assert!(projection.get(Table::Channels, "1").is_none());
    }
}
