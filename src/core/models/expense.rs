use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Expense {
    pub id: String,
    pub group_id: String,
    pub paid_by: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub category: String,
    pub description: String,
    #[schema(value_type = String, example = "2024-06-01")]
    pub date: NaiveDate,
    pub locked: bool,
    pub locked_reason: Option<String>,
    #[schema(value_type = Option<String>)]
    pub locked_at: Option<DateTime<Utc>>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Split {
    pub id: String,
    pub expense_id: String,
    pub user_id: String,
    #[schema(value_type = String)]
    pub amount_owed: Decimal,
}

/// How an expense is divided between participants.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SplitRequest {
    /// Equal shares; the remainder goes to the first participants.
    Equal { participants: Vec<String> },
    Custom { shares: Vec<Share> },
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Share {
    pub user_id: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ExpenseDraft {
    pub paid_by: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub category: String,
    pub description: String,
    #[schema(value_type = String, example = "2024-06-01")]
    pub date: NaiveDate,
    pub split: SplitRequest,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ExpensePatch {
    pub paid_by: Option<String>,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    /// Replaces every split when present. Required when `amount` changes.
    pub split: Option<SplitRequest>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ExpenseWithSplits {
    pub expense: Expense,
    pub splits: Vec<Split>,
}
