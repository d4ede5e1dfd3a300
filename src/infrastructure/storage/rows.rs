//! Conversions between ledger models and logical rows.
//!
//! Decimals, dates and timestamps are stored as strings so any backend can
//! hold them without loss.

use crate::core::errors::LedgerError;
use crate::core::models::{
    expense::{Expense, Split},
    group::{Group, Member, Role},
    payment::{Payment, PaymentStatus},
    period::{Period, PeriodStatus},
};
use crate::infrastructure::store::Row;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::str::FromStr;

fn corrupt(column: &str, value: &Value) -> LedgerError {
    LedgerError::StorageError(format!("unreadable value in column {}: {}", column, value))
}

pub fn text(value: impl ToString) -> Value {
    Value::String(value.to_string())
}

pub fn opt_text<T: ToString>(value: Option<T>) -> Value {
    value.map(text).unwrap_or(Value::Null)
}

pub fn timestamp(value: DateTime<Utc>) -> Value {
    Value::String(value.to_rfc3339())
}

pub fn opt_timestamp(value: Option<DateTime<Utc>>) -> Value {
    value.map(timestamp).unwrap_or(Value::Null)
}

struct Reader<'a>(&'a Row);

impl Reader<'_> {
    fn raw(&self, column: &str) -> &Value {
        self.0.get(column).unwrap_or(&Value::Null)
    }

    fn opt_string(&self, column: &str) -> Result<Option<String>, LedgerError> {
        match self.raw(column) {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            other => Err(corrupt(column, other)),
        }
    }

    fn string(&self, column: &str) -> Result<String, LedgerError> {
        self.opt_string(column)?.ok_or_else(|| corrupt(column, &Value::Null))
    }

    fn bool(&self, column: &str) -> Result<bool, LedgerError> {
        match self.raw(column) {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            other => Err(corrupt(column, other)),
        }
    }

    fn decimal(&self, column: &str) -> Result<Decimal, LedgerError> {
        match self.raw(column) {
            Value::String(s) => Decimal::from_str(s).map_err(|_| corrupt(column, self.raw(column))),
            Value::Number(n) => Decimal::from_str(&n.to_string()).map_err(|_| corrupt(column, self.raw(column))),
            other => Err(corrupt(column, other)),
        }
    }

    fn date(&self, column: &str) -> Result<NaiveDate, LedgerError> {
        let raw = self.string(column)?;
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| corrupt(column, self.raw(column)))
    }

    fn opt_timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>, LedgerError> {
        self.opt_string(column)?
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| corrupt(column, self.raw(column)))
            })
            .transpose()
    }

    fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, LedgerError> {
        self.opt_timestamp(column)?.ok_or_else(|| corrupt(column, &Value::Null))
    }
}

fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

pub fn group_to_row(group: &Group) -> Row {
    object(json!({
        "id": group.id,
        "name": group.name,
        "created_by": group.created_by,
        "archived": group.archived,
        "archive_suggested_at": opt_timestamp(group.archive_suggested_at),
        "last_global_confirmation_at": opt_timestamp(group.last_global_confirmation_at),
    }))
}

pub fn group_from_row(row: &Row) -> Result<Group, LedgerError> {
    let r = Reader(row);
    Ok(Group {
        id: r.string("id")?,
        name: r.string("name")?,
        created_by: r.string("created_by")?,
        archived: r.bool("archived")?,
        archive_suggested_at: r.opt_timestamp("archive_suggested_at")?,
        last_global_confirmation_at: r.opt_timestamp("last_global_confirmation_at")?,
    })
}

pub fn member_to_row(member: &Member) -> Row {
    object(json!({
        "id": member.id,
        "group_id": member.group_id,
        "user_id": member.user_id,
        "role": member.role.as_str(),
    }))
}

pub fn member_from_row(row: &Row) -> Result<Member, LedgerError> {
    let r = Reader(row);
    let role = r.string("role")?;
    Ok(Member {
        id: r.string("id")?,
        group_id: r.string("group_id")?,
        user_id: r.string("user_id")?,
        role: Role::parse(&role).ok_or_else(|| corrupt("role", r.raw("role")))?,
    })
}

pub fn expense_to_row(expense: &Expense) -> Row {
    object(json!({
        "id": expense.id,
        "group_id": expense.group_id,
        "paid_by": expense.paid_by,
        "amount": text(expense.amount),
        "category": expense.category,
        "description": expense.description,
        "date": text(expense.date.format("%Y-%m-%d")),
        "locked": expense.locked,
        "locked_reason": opt_text(expense.locked_reason.as_ref()),
        "locked_at": opt_timestamp(expense.locked_at),
        "created_at": timestamp(expense.created_at),
    }))
}

pub fn expense_from_row(row: &Row) -> Result<Expense, LedgerError> {
    let r = Reader(row);
    Ok(Expense {
        id: r.string("id")?,
        group_id: r.string("group_id")?,
        paid_by: r.string("paid_by")?,
        amount: r.decimal("amount")?,
        category: r.opt_string("category")?.unwrap_or_default(),
        description: r.opt_string("description")?.unwrap_or_default(),
        date: r.date("date")?,
        locked: r.bool("locked")?,
        locked_reason: r.opt_string("locked_reason")?,
        locked_at: r.opt_timestamp("locked_at")?,
        created_at: r.timestamp("created_at")?,
    })
}

pub fn split_to_row(split: &Split) -> Row {
    object(json!({
        "id": split.id,
        "expense_id": split.expense_id,
        "user_id": split.user_id,
        "amount_owed": text(split.amount_owed),
    }))
}

pub fn split_from_row(row: &Row) -> Result<Split, LedgerError> {
    let r = Reader(row);
    Ok(Split {
        id: r.string("id")?,
        expense_id: r.string("expense_id")?,
        user_id: r.string("user_id")?,
        amount_owed: r.decimal("amount_owed")?,
    })
}

pub fn payment_to_row(payment: &Payment) -> Row {
    object(json!({
        "id": payment.id,
        "group_id": payment.group_id,
        "from_user_id": payment.from_user_id,
        "to_user_id": payment.to_user_id,
        "amount": text(payment.amount),
        "status": payment.status.as_str(),
        "created_at": timestamp(payment.created_at),
        "updated_at": timestamp(payment.updated_at),
        "paid_at": opt_timestamp(payment.paid_at),
    }))
}

pub fn payment_from_row(row: &Row) -> Result<Payment, LedgerError> {
    let r = Reader(row);
    let status = r.string("status")?;
    Ok(Payment {
        id: r.string("id")?,
        group_id: r.string("group_id")?,
        from_user_id: r.string("from_user_id")?,
        to_user_id: r.string("to_user_id")?,
        amount: r.decimal("amount")?,
        status: PaymentStatus::parse(&status).ok_or_else(|| corrupt("status", r.raw("status")))?,
        created_at: r.timestamp("created_at")?,
        updated_at: r.timestamp("updated_at")?,
        paid_at: r.opt_timestamp("paid_at")?,
    })
}

pub fn period_to_row(period: &Period) -> Row {
    object(json!({
        "id": period.id,
        "group_id": period.group_id,
        "date_from": text(period.date_from.format("%Y-%m-%d")),
        "date_to": text(period.date_to.format("%Y-%m-%d")),
        "status": period.status.as_str(),
        "closed_at": opt_timestamp(period.closed_at),
        "closed_by": opt_text(period.closed_by.as_ref()),
    }))
}

pub fn period_from_row(row: &Row) -> Result<Period, LedgerError> {
    let r = Reader(row);
    let status = r.string("status")?;
    Ok(Period {
        id: r.string("id")?,
        group_id: r.string("group_id")?,
        date_from: r.date("date_from")?,
        date_to: r.date("date_to")?,
        status: PeriodStatus::parse(&status).ok_or_else(|| corrupt("status", r.raw("status")))?,
        closed_at: r.opt_timestamp("closed_at")?,
        closed_by: r.opt_string("closed_by")?,
    })
}
