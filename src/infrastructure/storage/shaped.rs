use crate::core::errors::LedgerError;
use crate::core::models::{
    expense::{Expense, Split},
    group::{Group, Member},
    payment::{Payment, PaymentStatus},
    period::Period,
};
use crate::infrastructure::cache::ShapeCache;
use crate::infrastructure::schema::{
    EntityShapes, EXPENSE_COLUMNS, GROUP_COLUMNS, MEMBER_COLUMNS, PAYMENT_COLUMNS, PERIOD_COLUMNS, SPLIT_COLUMNS,
    SchemaResolver, ShapeCatalog, ShapeDescriptor, ShapeResolution,
};
use crate::infrastructure::storage::Storage;
use crate::infrastructure::storage::rows::{self, opt_timestamp, timestamp};
use crate::infrastructure::store::in_memory::InMemoryStore;
use crate::infrastructure::store::{Condition, RelationalStore, Row, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{debug, warn};

fn store_error(err: StoreError) -> LedgerError {
    match err {
        StoreError::UniqueViolation { table, .. } => LedgerError::DuplicateRow(table),
        other => LedgerError::StorageError(other.to_string()),
    }
}

fn eq(column: &str, value: impl Into<Value>) -> Condition {
    Condition::Eq(column.to_string(), value.into())
}

fn patch(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

/// [`Storage`] over any [`RelationalStore`], reading and writing through the
/// table shapes in the supplied catalog.
pub struct ShapedStorage<R: RelationalStore, C: ShapeCache> {
    store: R,
    cache: C,
    catalog: ShapeCatalog,
}

impl<R: RelationalStore, C: ShapeCache> ShapedStorage<R, C> {
    pub fn new(store: R, cache: C, catalog: ShapeCatalog) -> Self {
        ShapedStorage { store, cache, catalog }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Resolves every entity up front so deployment errors surface at boot.
    pub async fn verify(&self) -> Result<Vec<ShapeDescriptor>, LedgerError> {
        let mut shapes = Vec::new();
        for entity in self.catalog.all() {
            shapes.push(self.shape(entity).await?);
        }
        Ok(shapes)
    }

    async fn shape(&self, shapes: &EntityShapes) -> Result<ShapeDescriptor, LedgerError> {
        if let Some(shape) = self.cache.get_shape(shapes.entity()).await? {
            return Ok(shape);
        }
        self.resolve(shapes).await
    }

    async fn resolve(&self, shapes: &EntityShapes) -> Result<ShapeDescriptor, LedgerError> {
        match SchemaResolver::resolve(&self.store, shapes).await.map_err(store_error)? {
            ShapeResolution::Matched(shape) => {
                self.cache.save_shape(shapes.entity(), &shape).await?;
                Ok(shape)
            }
            ShapeResolution::NoMatch { entity, tried } => Err(LedgerError::SchemaUnavailable { entity, tried }),
        }
    }

    async fn forget_on_schema_error(&self, shapes: &EntityShapes, err: &StoreError) -> Result<(), LedgerError> {
        if err.is_schema_absence() {
            warn!("cached shape for {} is stale: {}", shapes.entity(), err);
            self.cache.invalidate_shape(shapes.entity()).await?;
        }
        Ok(())
    }

    /// Reads are retried once against a freshly resolved shape when the
    /// cached one has disappeared.
    async fn select(&self, shapes: &EntityShapes, filter: Vec<Condition>) -> Result<Vec<Row>, LedgerError> {
        let shape = self.shape(shapes).await?;
        let (shape, rows) = match self.store.select(&shape.table, &shape.conditions(filter.clone())).await {
            Ok(rows) => (shape, rows),
            Err(err) if err.is_schema_absence() => {
                self.forget_on_schema_error(shapes, &err).await?;
                let shape = self.resolve(shapes).await?;
                debug!("retrying {} read against {}", shapes.entity(), shape.table);
                let rows = self
                    .store
                    .select(&shape.table, &shape.conditions(filter))
                    .await
                    .map_err(store_error)?;
                (shape, rows)
            }
            Err(err) => return Err(store_error(err)),
        };
        Ok(rows
            .into_iter()
            .map(|row| shape.to_logical(shapes.columns(), row))
            .collect())
    }

    async fn insert(&self, shapes: &EntityShapes, row: Row) -> Result<(), LedgerError> {
        let shape = self.shape(shapes).await?;
        match self.store.insert(&shape.table, shape.to_physical(row)).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.forget_on_schema_error(shapes, &err).await?;
                Err(store_error(err))
            }
        }
    }

    async fn update(&self, shapes: &EntityShapes, filter: Vec<Condition>, values: Row) -> Result<u64, LedgerError> {
        let shape = self.shape(shapes).await?;
        match self
            .store
            .update_where(&shape.table, &shape.conditions(filter), shape.to_physical(values))
            .await
        {
            Ok(count) => Ok(count),
            Err(err) => {
                self.forget_on_schema_error(shapes, &err).await?;
                Err(store_error(err))
            }
        }
    }

    async fn delete(&self, shapes: &EntityShapes, filter: Vec<Condition>) -> Result<u64, LedgerError> {
        let shape = self.shape(shapes).await?;
        match self.store.delete_where(&shape.table, &shape.conditions(filter)).await {
            Ok(count) => Ok(count),
            Err(err) => {
                self.forget_on_schema_error(shapes, &err).await?;
                Err(store_error(err))
            }
        }
    }

    async fn select_one<T>(
        &self,
        shapes: &EntityShapes,
        filter: Vec<Condition>,
        decode: fn(&Row) -> Result<T, LedgerError>,
    ) -> Result<Option<T>, LedgerError> {
        self.select(shapes, filter)
            .await?
            .first()
            .map(decode)
            .transpose()
    }

    async fn select_all<T>(
        &self,
        shapes: &EntityShapes,
        filter: Vec<Condition>,
        decode: fn(&Row) -> Result<T, LedgerError>,
    ) -> Result<Vec<T>, LedgerError> {
        self.select(shapes, filter).await?.iter().map(decode).collect()
    }
}

#[async_trait]
impl<R: RelationalStore, C: ShapeCache> Storage for ShapedStorage<R, C> {
    async fn save_group(&self, group: Group) -> Result<(), LedgerError> {
        self.insert(&self.catalog.group, rows::group_to_row(&group)).await
    }

    async fn get_group(&self, group_id: &str) -> Result<Option<Group>, LedgerError> {
        self.select_one(&self.catalog.group, vec![eq("id", group_id)], rows::group_from_row)
            .await
    }

    async fn record_group_confirmation(&self, group_id: &str, at: DateTime<Utc>) -> Result<(), LedgerError> {
        self.update(
            &self.catalog.group,
            vec![eq("id", group_id)],
            patch(json!({ "last_global_confirmation_at": timestamp(at) })),
        )
        .await?;
        Ok(())
    }

    async fn add_member(&self, member: Member) -> Result<(), LedgerError> {
        self.insert(&self.catalog.member, rows::member_to_row(&member)).await
    }

    async fn remove_member(&self, group_id: &str, user_id: &str) -> Result<(), LedgerError> {
        self.delete(&self.catalog.member, vec![eq("group_id", group_id), eq("user_id", user_id)])
            .await?;
        Ok(())
    }

    async fn get_member(&self, group_id: &str, user_id: &str) -> Result<Option<Member>, LedgerError> {
        self.select_one(
            &self.catalog.member,
            vec![eq("group_id", group_id), eq("user_id", user_id)],
            rows::member_from_row,
        )
        .await
    }

    async fn list_members(&self, group_id: &str) -> Result<Vec<Member>, LedgerError> {
        self.select_all(&self.catalog.member, vec![eq("group_id", group_id)], rows::member_from_row)
            .await
    }

    async fn insert_expense(&self, expense: Expense) -> Result<(), LedgerError> {
        self.insert(&self.catalog.expense, rows::expense_to_row(&expense)).await
    }

    async fn update_unlocked_expense(&self, expense: Expense) -> Result<bool, LedgerError> {
        let mut values = rows::expense_to_row(&expense);
        values.remove("id");
        let touched = self
            .update(
                &self.catalog.expense,
                vec![eq("id", expense.id.as_str()), eq("locked", false)],
                values,
            )
            .await?;
        Ok(touched > 0)
    }

    async fn delete_unlocked_expense(&self, expense_id: &str) -> Result<bool, LedgerError> {
        let removed = self
            .delete(&self.catalog.expense, vec![eq("id", expense_id), eq("locked", false)])
            .await?;
        Ok(removed > 0)
    }

    async fn purge_expense(&self, expense_id: &str) -> Result<(), LedgerError> {
        // Parent first: orphaned splits never reach a balance, an expense
        // without its splits would.
        self.delete(&self.catalog.expense, vec![eq("id", expense_id)]).await?;
        self.delete(&self.catalog.split, vec![eq("expense_id", expense_id)]).await?;
        Ok(())
    }

    async fn lock_expense(&self, expense_id: &str, reason: &str, at: DateTime<Utc>) -> Result<bool, LedgerError> {
        let touched = self
            .update(
                &self.catalog.expense,
                vec![eq("id", expense_id), eq("locked", false)],
                patch(json!({
                    "locked": true,
                    "locked_reason": reason,
                    "locked_at": timestamp(at),
                })),
            )
            .await?;
        Ok(touched > 0)
    }

    async fn get_expense(&self, expense_id: &str) -> Result<Option<Expense>, LedgerError> {
        self.select_one(&self.catalog.expense, vec![eq("id", expense_id)], rows::expense_from_row)
            .await
    }

    async fn list_expenses(&self, group_id: &str) -> Result<Vec<Expense>, LedgerError> {
        let mut expenses = self
            .select_all(&self.catalog.expense, vec![eq("group_id", group_id)], rows::expense_from_row)
            .await?;
        expenses.sort_by_key(|e| (e.date, e.created_at));
        Ok(expenses)
    }

    async fn insert_split(&self, split: Split) -> Result<(), LedgerError> {
        self.insert(&self.catalog.split, rows::split_to_row(&split)).await
    }

    async fn delete_splits(&self, expense_id: &str) -> Result<(), LedgerError> {
        self.delete(&self.catalog.split, vec![eq("expense_id", expense_id)]).await?;
        Ok(())
    }

    async fn list_splits(&self, expense_ids: &[String]) -> Result<Vec<Split>, LedgerError> {
        if expense_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = expense_ids.iter().map(|id| Value::String(id.clone())).collect();
        self.select_all(
            &self.catalog.split,
            vec![Condition::In("expense_id".to_string(), ids)],
            rows::split_from_row,
        )
        .await
    }

    async fn insert_payment(&self, payment: Payment) -> Result<(), LedgerError> {
        self.insert(&self.catalog.payment, rows::payment_to_row(&payment)).await
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>, LedgerError> {
        self.select_one(&self.catalog.payment, vec![eq("id", payment_id)], rows::payment_from_row)
            .await
    }

    async fn list_payments(&self, group_id: &str) -> Result<Vec<Payment>, LedgerError> {
        let mut payments = self
            .select_all(&self.catalog.payment, vec![eq("group_id", group_id)], rows::payment_from_row)
            .await?;
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn transition_payment(
        &self,
        payment_id: &str,
        expected: PaymentStatus,
        next: PaymentStatus,
        updated_at: DateTime<Utc>,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<bool, LedgerError> {
        let mut values = patch(json!({
            "status": next.as_str(),
            "updated_at": timestamp(updated_at),
        }));
        if paid_at.is_some() {
            values.insert("paid_at".to_string(), opt_timestamp(paid_at));
        }
        let touched = self
            .update(
                &self.catalog.payment,
                vec![eq("id", payment_id), eq("status", expected.as_str())],
                values,
            )
            .await?;
        Ok(touched == 1)
    }

    async fn insert_period(&self, period: Period) -> Result<(), LedgerError> {
        self.insert(&self.catalog.period, rows::period_to_row(&period)).await
    }

    async fn update_period(&self, period: Period) -> Result<(), LedgerError> {
        let mut values = rows::period_to_row(&period);
        values.remove("id");
        let touched = self
            .update(&self.catalog.period, vec![eq("id", period.id.as_str())], values)
            .await?;
        if touched == 0 {
            return Err(LedgerError::PeriodNotFound(period.id));
        }
        Ok(())
    }

    async fn get_period(&self, period_id: &str) -> Result<Option<Period>, LedgerError> {
        self.select_one(&self.catalog.period, vec![eq("id", period_id)], rows::period_from_row)
            .await
    }

    async fn list_periods(&self, group_id: &str) -> Result<Vec<Period>, LedgerError> {
        self.select_all(&self.catalog.period, vec![eq("group_id", group_id)], rows::period_from_row)
            .await
    }
}

/// Store with the first-choice table layout for every entity.
pub fn standard_store() -> InMemoryStore {
    InMemoryStore::new()
        .with_table("groups", GROUP_COLUMNS)
        .with_table("group_members", MEMBER_COLUMNS)
        .with_unique("group_members", &["group_id", "user_id"])
        .with_table("expenses", EXPENSE_COLUMNS)
        .with_table("expense_splits", SPLIT_COLUMNS)
        .with_table("payments", PAYMENT_COLUMNS)
        .with_table("periods", PERIOD_COLUMNS)
}
