//! Table shapes for each logical ledger entity.
//!
//! A deployment may carry any one of several historical layouts for the same
//! entity (for example `divvy_members.divvy_id` versus
//! `group_members.group_id`). Storage is handed an explicit [`ShapeCatalog`]
//! and resolves the first candidate the store accepts.

pub mod resolver;

pub use resolver::{SchemaResolver, ShapeResolution};

use crate::core::errors::LedgerError;
use crate::infrastructure::store::{Condition, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GROUP_COLUMNS: &[&str] = &[
    "id",
    "name",
    "created_by",
    "archived",
    "archive_suggested_at",
    "last_global_confirmation_at",
];
pub const MEMBER_COLUMNS: &[&str] = &["id", "group_id", "user_id", "role"];
pub const EXPENSE_COLUMNS: &[&str] = &[
    "id",
    "group_id",
    "paid_by",
    "amount",
    "category",
    "description",
    "date",
    "locked",
    "locked_reason",
    "locked_at",
    "created_at",
];
pub const SPLIT_COLUMNS: &[&str] = &["id", "expense_id", "user_id", "amount_owed"];
pub const PAYMENT_COLUMNS: &[&str] = &[
    "id",
    "group_id",
    "from_user_id",
    "to_user_id",
    "amount",
    "status",
    "created_at",
    "updated_at",
    "paid_at",
];
pub const PERIOD_COLUMNS: &[&str] = &["id", "group_id", "date_from", "date_to", "status", "closed_at", "closed_by"];

/// One physical layout: a table name plus logical-to-physical column renames.
/// Logical columns without a rename keep their own name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    pub table: String,
    pub renames: BTreeMap<String, String>,
}

impl ShapeDescriptor {
    pub fn new(table: &str) -> Self {
        ShapeDescriptor {
            table: table.to_string(),
            renames: BTreeMap::new(),
        }
    }

    pub fn rename(mut self, logical: &str, physical: &str) -> Self {
        self.renames.insert(logical.to_string(), physical.to_string());
        self
    }

    pub fn column<'a>(&'a self, logical: &'a str) -> &'a str {
        self.renames.get(logical).map(String::as_str).unwrap_or(logical)
    }

    pub fn physical_columns(&self, logical: &[&str]) -> Vec<String> {
        logical.iter().map(|c| self.column(c).to_string()).collect()
    }

    pub fn to_physical(&self, row: Row) -> Row {
        row.into_iter()
            .map(|(column, value)| (self.column(&column).to_string(), value))
            .collect()
    }

    pub fn to_logical(&self, columns: &[&str], mut row: Row) -> Row {
        columns
            .iter()
            .map(|logical| {
                let value = row.remove(self.column(logical)).unwrap_or(serde_json::Value::Null);
                (logical.to_string(), value)
            })
            .collect()
    }

    pub fn condition(&self, condition: Condition) -> Condition {
        match condition {
            Condition::Eq(column, value) => Condition::Eq(self.column(&column).to_string(), value),
            Condition::In(column, values) => Condition::In(self.column(&column).to_string(), values),
        }
    }

    pub fn conditions(&self, filter: Vec<Condition>) -> Vec<Condition> {
        filter.into_iter().map(|c| self.condition(c)).collect()
    }
}

/// Ordered candidate layouts for a single logical entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityShapes {
    entity: &'static str,
    columns: &'static [&'static str],
    candidates: Vec<ShapeDescriptor>,
}

impl EntityShapes {
    pub fn new(
        entity: &'static str,
        columns: &'static [&'static str],
        candidates: Vec<ShapeDescriptor>,
    ) -> Result<Self, LedgerError> {
        if candidates.is_empty() {
            return Err(LedgerError::SchemaUnavailable {
                entity: entity.to_string(),
                tried: Vec::new(),
            });
        }
        Ok(EntityShapes {
            entity,
            columns,
            candidates,
        })
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    pub fn candidates(&self) -> &[ShapeDescriptor] {
        &self.candidates
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeCatalog {
    pub group: EntityShapes,
    pub member: EntityShapes,
    pub expense: EntityShapes,
    pub split: EntityShapes,
    pub payment: EntityShapes,
    pub period: EntityShapes,
}

impl ShapeCatalog {
    /// Layouts seen across deployments: the original `divvy_*` tables and the
    /// later generic names.
    pub fn standard() -> Result<Self, LedgerError> {
        Ok(ShapeCatalog {
            group: EntityShapes::new(
                "group",
                GROUP_COLUMNS,
                vec![ShapeDescriptor::new("groups"), ShapeDescriptor::new("divvies")],
            )?,
            member: EntityShapes::new(
                "membership",
                MEMBER_COLUMNS,
                vec![
                    ShapeDescriptor::new("group_members"),
                    ShapeDescriptor::new("divvy_members").rename("group_id", "divvy_id"),
                ],
            )?,
            expense: EntityShapes::new(
                "expense",
                EXPENSE_COLUMNS,
                vec![
                    ShapeDescriptor::new("expenses"),
                    ShapeDescriptor::new("divvy_expenses").rename("group_id", "divvy_id"),
                ],
            )?,
            split: EntityShapes::new(
                "split",
                SPLIT_COLUMNS,
                vec![
                    ShapeDescriptor::new("expense_splits"),
                    ShapeDescriptor::new("divvy_expense_splits").rename("amount_owed", "amount"),
                ],
            )?,
            payment: EntityShapes::new(
                "payment",
                PAYMENT_COLUMNS,
                vec![
                    ShapeDescriptor::new("payments"),
                    ShapeDescriptor::new("transactions")
                        .rename("group_id", "divvy_id")
                        .rename("from_user_id", "from_user")
                        .rename("to_user_id", "to_user"),
                ],
            )?,
            period: EntityShapes::new(
                "period",
                PERIOD_COLUMNS,
                vec![
                    ShapeDescriptor::new("periods"),
                    ShapeDescriptor::new("divvy_periods").rename("group_id", "divvy_id"),
                ],
            )?,
        })
    }

    pub fn all(&self) -> [&EntityShapes; 6] {
        [&self.group, &self.member, &self.expense, &self.split, &self.payment, &self.period]
    }
}
