//! Relational store contract used by the schema-resilient storage layer.
//!
//! Rows are JSON objects keyed by physical column name. Every call names the
//! physical table it targets; mapping from logical entities happens one layer
//! up in [`crate::infrastructure::schema`].

pub mod in_memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Condition {
    pub fn column(&self) -> &str {
        match self {
            Condition::Eq(column, _) | Condition::In(column, _) => column,
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Condition::Eq(column, value) => row.get(column) == Some(value),
            Condition::In(column, values) => row.get(column).is_some_and(|v| values.contains(v)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("relation \"{0}\" does not exist")]
    UndefinedTable(String),
    #[error("column \"{column}\" of relation \"{table}\" does not exist")]
    UndefinedColumn { table: String, column: String },
    #[error("duplicate key value violates unique constraint on {table} ({columns:?})")]
    UniqueViolation { table: String, columns: Vec<String> },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Missing relations and columns are the only errors that justify trying
    /// another table shape.
    pub fn is_schema_absence(&self) -> bool {
        matches!(self, StoreError::UndefinedTable(_) | StoreError::UndefinedColumn { .. })
    }
}

#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Equivalent of `SELECT <columns> FROM <table> LIMIT 1`.
    async fn probe(&self, table: &str, columns: &[String]) -> Result<(), StoreError>;
    async fn select(&self, table: &str, filter: &[Condition]) -> Result<Vec<Row>, StoreError>;
    async fn insert(&self, table: &str, row: Row) -> Result<(), StoreError>;
    /// Conditional update; returns the number of rows that matched `filter`.
    async fn update_where(&self, table: &str, filter: &[Condition], patch: Row) -> Result<u64, StoreError>;
    async fn delete_where(&self, table: &str, filter: &[Condition]) -> Result<u64, StoreError>;
}
