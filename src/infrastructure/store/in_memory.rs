use crate::infrastructure::store::{Condition, RelationalStore, Row, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::trace;

#[derive(Debug, Default)]
struct Table {
    columns: BTreeSet<String>,
    unique_keys: Vec<Vec<String>>,
    rows: Vec<Row>,
}

impl Table {
    fn check_columns<'a>(&self, name: &str, columns: impl IntoIterator<Item = &'a str>) -> Result<(), StoreError> {
        for column in columns {
            if !self.columns.contains(column) {
                return Err(StoreError::UndefinedColumn {
                    table: name.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_unique(&self, name: &str, candidate: &Row, skip: Option<usize>) -> Result<(), StoreError> {
        for key in &self.unique_keys {
            let clash = self.rows.iter().enumerate().any(|(idx, row)| {
                Some(idx) != skip && key.iter().all(|col| row.get(col) == candidate.get(col))
            });
            if clash {
                return Err(StoreError::UniqueViolation {
                    table: name.to_string(),
                    columns: key.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Table-and-column aware store kept entirely in memory.
///
/// Queries against undeclared tables or columns fail the same way a SQL
/// backend would, which is what shape probing relies on. All writes take the
/// single write lock, so `update_where` is an atomic compare-and-swap.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_table(mut self, name: &str, columns: &[&str]) -> Self {
        let table = Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Table::default()
        };
        self.tables.get_mut().insert(name.to_string(), table);
        self
    }

    pub fn with_unique(mut self, name: &str, columns: &[&str]) -> Self {
        if let Some(table) = self.tables.get_mut().get_mut(name) {
            table.unique_keys.push(columns.iter().map(|c| c.to_string()).collect());
        }
        self
    }

    /// Creates an empty table at runtime, as a migration would.
    pub async fn create_table(&self, name: &str, columns: &[&str]) {
        let table = Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Table::default()
        };
        self.tables.write().await.insert(name.to_string(), table);
    }

    pub async fn drop_table(&self, name: &str) {
        self.tables.write().await.remove(name);
    }

    pub async fn row_count(&self, name: &str) -> usize {
        self.tables.read().await.get(name).map(|t| t.rows.len()).unwrap_or(0)
    }
}

fn lookup<'a>(tables: &'a HashMap<String, Table>, name: &str) -> Result<&'a Table, StoreError> {
    tables.get(name).ok_or_else(|| StoreError::UndefinedTable(name.to_string()))
}

fn lookup_mut<'a>(tables: &'a mut HashMap<String, Table>, name: &str) -> Result<&'a mut Table, StoreError> {
    tables
        .get_mut(name)
        .ok_or_else(|| StoreError::UndefinedTable(name.to_string()))
}

fn matches_all(row: &Row, filter: &[Condition]) -> bool {
    filter.iter().all(|c| c.matches(row))
}

#[async_trait]
impl RelationalStore for InMemoryStore {
    async fn probe(&self, table: &str, columns: &[String]) -> Result<(), StoreError> {
        let tables = self.tables.read().await;
        let t = lookup(&tables, table)?;
        t.check_columns(table, columns.iter().map(String::as_str))?;
        trace!("probe {} ok", table);
        Ok(())
    }

    async fn select(&self, table: &str, filter: &[Condition]) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        let t = lookup(&tables, table)?;
        t.check_columns(table, filter.iter().map(Condition::column))?;
        Ok(t.rows.iter().filter(|row| matches_all(row, filter)).cloned().collect())
    }

    async fn insert(&self, table: &str, row: Row) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let t = lookup_mut(&mut tables, table)?;
        t.check_columns(table, row.keys().map(String::as_str))?;
        let mut full = Row::new();
        for column in &t.columns {
            full.insert(column.clone(), row.get(column).cloned().unwrap_or(Value::Null));
        }
        t.check_unique(table, &full, None)?;
        t.rows.push(full);
        Ok(())
    }

    async fn update_where(&self, table: &str, filter: &[Condition], patch: Row) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let t = lookup_mut(&mut tables, table)?;
        t.check_columns(table, filter.iter().map(Condition::column).chain(patch.keys().map(String::as_str)))?;

        let targets: Vec<usize> = t
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| matches_all(row, filter))
            .map(|(idx, _)| idx)
            .collect();
        for &idx in &targets {
            let mut updated = t.rows[idx].clone();
            for (column, value) in &patch {
                updated.insert(column.clone(), value.clone());
            }
            t.check_unique(table, &updated, Some(idx))?;
            t.rows[idx] = updated;
        }
        Ok(targets.len() as u64)
    }

    async fn delete_where(&self, table: &str, filter: &[Condition]) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let t = lookup_mut(&mut tables, table)?;
        t.check_columns(table, filter.iter().map(Condition::column))?;
        let before = t.rows.len();
        t.rows.retain(|row| !matches_all(row, filter));
        Ok((before - t.rows.len()) as u64)
    }
}
