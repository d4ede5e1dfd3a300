use crate::auth::IdentityProvider;
use crate::core::balance::{BalanceSheet, MemberBalance, calculate_balances};
use crate::core::errors::LedgerError;
use crate::core::models::{
    expense::{Expense, ExpenseDraft, ExpensePatch, ExpenseWithSplits, Split},
    group::{Group, Member},
    payment::{Payment, PaymentAction, PaymentStatus},
    period::{DateRange, Period, PeriodStatus},
};
use crate::core::money::validate_amount;
use crate::core::payments::plan_transition;
use crate::core::periods::{
    LOCK_REASON_CLOSED, LOCK_REASON_SETTLED, closed_period_covering, expenses_to_lock, is_fully_resolved,
    period_with_bounds, settled_range,
};
use crate::core::settlement::{Transfer, propose_transfers};
use crate::core::splits::build_splits;
use crate::infrastructure::notifications::{LedgerEvent, Notifier};
use crate::infrastructure::storage::Storage;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, ToSchema, Clone, PartialEq)]
pub struct BalanceReport {
    pub balances: Vec<MemberBalance>,
    /// Net position of identities that are no longer members.
    #[schema(value_type = String)]
    pub unattributed: Decimal,
    pub payments: Vec<Payment>,
}

impl BalanceReport {
    pub fn balance_of(&self, user_id: &str) -> Option<Decimal> {
        self.balances.iter().find(|b| b.user_id == user_id).map(|b| b.amount)
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema, Clone, PartialEq)]
pub struct SettlementProposal {
    pub transfers: Vec<Transfer>,
}

/// Everything the balance calculator reads for one group.
struct Ledger {
    members: Vec<Member>,
    expenses: Vec<Expense>,
    splits: Vec<Split>,
    payments: Vec<Payment>,
}

impl Ledger {
    fn balances(&self, range: DateRange) -> Result<BalanceSheet, LedgerError> {
        calculate_balances(&self.members, &self.expenses, &self.splits, &self.payments, range)
    }
}

pub struct LedgerService<S: Storage, N: Notifier, I: IdentityProvider> {
    storage: S,
    notifier: N,
    identity: I,
    money_scale: u32,
}

impl<S: Storage, N: Notifier, I: IdentityProvider> LedgerService<S, N, I> {
    pub fn new(storage: S, notifier: N, identity: I, money_scale: u32) -> Self {
        LedgerService {
            storage,
            notifier,
            identity,
            money_scale,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn authenticate(&self, credential: &str) -> Result<String, LedgerError> {
        self.identity.identify(credential)
    }

    async fn require_group(&self, group_id: &str) -> Result<Group, LedgerError> {
        self.storage
            .get_group(group_id)
            .await?
            .ok_or_else(|| LedgerError::GroupNotFound(group_id.to_string()))
    }

    async fn require_member(&self, group_id: &str, user_id: &str) -> Result<Member, LedgerError> {
        self.require_group(group_id).await?;
        self.storage
            .get_member(group_id, user_id)
            .await?
            .ok_or_else(|| LedgerError::NotGroupMember(user_id.to_string()))
    }

    async fn require_admin(&self, group_id: &str, user_id: &str) -> Result<Member, LedgerError> {
        let member = self.require_member(group_id, user_id).await?;
        if !member.role.can_manage_periods() {
            return Err(LedgerError::NotGroupAdmin(user_id.to_string()));
        }
        Ok(member)
    }

    async fn require_counterparty(&self, group_id: &str, field: &str, user_id: &str) -> Result<(), LedgerError> {
        if self.storage.get_member(group_id, user_id).await?.is_none() {
            return Err(LedgerError::invalid_input(
                field,
                format!("{} is not a member of group {}", user_id, group_id),
            ));
        }
        Ok(())
    }

    async fn require_expense(&self, expense_id: &str) -> Result<Expense, LedgerError> {
        self.storage
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| LedgerError::ExpenseNotFound(expense_id.to_string()))
    }

    fn validate_string_input(&self, field: &str, value: &str, max_length: usize, required: bool) -> Result<(), LedgerError> {
        if required && value.trim().is_empty() {
            return Err(LedgerError::invalid_input(field, format!("{} cannot be empty", field)));
        }
        if value.chars().count() > max_length {
            return Err(LedgerError::invalid_input(
                field,
                format!("{} cannot exceed {} characters", field, max_length),
            ));
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(LedgerError::invalid_input(field, format!("{} contains invalid characters", field)));
        }
        Ok(())
    }

    async fn ensure_date_open(&self, group_id: &str, date: NaiveDate) -> Result<(), LedgerError> {
        let periods = self.storage.list_periods(group_id).await?;
        if let Some(period) = closed_period_covering(&periods, date) {
            return Err(LedgerError::DateInClosedPeriod(date.to_string(), period.id.clone()));
        }
        Ok(())
    }

    async fn load_ledger(&self, group_id: &str) -> Result<Ledger, LedgerError> {
        let (members, expenses, payments) = futures::try_join!(
            self.storage.list_members(group_id),
            self.storage.list_expenses(group_id),
            self.storage.list_payments(group_id),
        )?;
        let expense_ids: Vec<String> = expenses.iter().map(|e| e.id.clone()).collect();
        let splits = self.storage.list_splits(&expense_ids).await?;
        Ok(Ledger {
            members,
            expenses,
            splits,
            payments,
        })
    }

    async fn dispatch(&self, event: LedgerEvent) {
        let name = event.name();
        if let Err(e) = self.notifier.notify(event).await {
            warn!("notification {} dropped: {}", name, e);
        }
    }

    pub async fn get_balances(
        &self,
        group_id: &str,
        caller: &str,
        range: DateRange,
    ) -> Result<BalanceReport, LedgerError> {
        self.require_member(group_id, caller).await?;
        let ledger = self.load_ledger(group_id).await?;
        let sheet = ledger.balances(range)?;
        if !sheet.unattributed.is_zero() {
            debug!("group {} has {} owed by departed members", group_id, sheet.unattributed);
        }
        let payments = ledger
            .payments
            .into_iter()
            .filter(|p| range.contains(p.created_at.date_naive()))
            .collect();
        Ok(BalanceReport {
            balances: sheet.balances,
            unattributed: sheet.unattributed,
            payments,
        })
    }

    pub async fn propose_settlement(&self, group_id: &str, caller: &str) -> Result<SettlementProposal, LedgerError> {
        self.require_member(group_id, caller).await?;
        let ledger = self.load_ledger(group_id).await?;
        let transfers = propose_transfers(&ledger.balances(DateRange::default())?.balances);
        Ok(SettlementProposal { transfers })
    }

    pub async fn list_payments(&self, group_id: &str, caller: &str) -> Result<Vec<Payment>, LedgerError> {
        self.require_member(group_id, caller).await?;
        self.storage.list_payments(group_id).await
    }

    pub async fn list_periods(&self, group_id: &str, caller: &str) -> Result<Vec<Period>, LedgerError> {
        self.require_member(group_id, caller).await?;
        let mut periods = self.storage.list_periods(group_id).await?;
        periods.sort_by_key(|p| (p.date_from, p.date_to));
        Ok(periods)
    }

    async fn create_payment(
        &self,
        group_id: &str,
        caller: &str,
        to_user_id: &str,
        amount: Decimal,
        status: PaymentStatus,
    ) -> Result<Payment, LedgerError> {
        self.require_member(group_id, caller).await?;
        if caller == to_user_id {
            return Err(LedgerError::SelfPayment);
        }
        self.require_counterparty(group_id, "to_user_id", to_user_id).await?;
        validate_amount("amount", amount, self.money_scale)?;

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            from_user_id: caller.to_string(),
            to_user_id: to_user_id.to_string(),
            amount,
            status,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };
        self.storage.insert_payment(payment.clone()).await?;
        info!(
            "payment {} created in {}: {} -> {} {} ({})",
            payment.id, group_id, caller, to_user_id, amount, status
        );
        Ok(payment)
    }

    /// Records an intended transfer from `from_user_id` to `to_user_id`.
    /// Only the debtor may create it.
    pub async fn create_pending_payment(
        &self,
        group_id: &str,
        caller: &str,
        from_user_id: &str,
        to_user_id: &str,
        amount: Decimal,
    ) -> Result<Payment, LedgerError> {
        if caller != from_user_id {
            return Err(LedgerError::NotPaymentDebtor(from_user_id.to_string()));
        }
        self.create_payment(group_id, caller, to_user_id, amount, PaymentStatus::Pending)
            .await
    }

    /// Records a transfer the debtor says has already been made, skipping
    /// `pending`.
    pub async fn record_payment_sent(
        &self,
        group_id: &str,
        caller: &str,
        from_user_id: &str,
        to_user_id: &str,
        amount: Decimal,
    ) -> Result<Payment, LedgerError> {
        if caller != from_user_id {
            return Err(LedgerError::NotPaymentDebtor(from_user_id.to_string()));
        }
        let payment = self
            .create_payment(group_id, caller, to_user_id, amount, PaymentStatus::PaymentSent)
            .await?;
        self.dispatch(payment_event(&payment)).await;
        Ok(payment)
    }

    /// Applies `action` to a payment.
    ///
    /// The write is conditional on the status read here, so of two racing
    /// transitions on one payment at most one succeeds; the other gets a
    /// conflict. A confirmation that leaves the group fully resolved closes
    /// the settled range.
    pub async fn transition_payment(
        &self,
        payment_id: &str,
        action: PaymentAction,
        caller: &str,
    ) -> Result<Payment, LedgerError> {
        let payment = self
            .storage
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| LedgerError::PaymentNotFound(payment_id.to_string()))?;
        let next = plan_transition(&payment, action, caller)?;

        let now = Utc::now();
        let paid_at = (next == PaymentStatus::Confirmed).then_some(now);
        if !self
            .storage
            .transition_payment(payment_id, payment.status, next, now, paid_at)
            .await?
        {
            warn!("payment {} changed under {} by {}", payment_id, action, caller);
            return Err(LedgerError::PaymentModifiedConcurrently(payment_id.to_string()));
        }

        let updated = Payment {
            status: next,
            updated_at: now,
            paid_at: paid_at.or(payment.paid_at),
            ..payment
        };
        info!("payment {} {} -> {} by {}", payment_id, action, next, caller);

        if next == PaymentStatus::Confirmed {
            // The status change is committed; the stamp only feeds archive hints.
            if let Err(e) = self.storage.record_group_confirmation(&updated.group_id, now).await {
                error!("could not stamp confirmation on group {}: {}", updated.group_id, e);
            }
        }
        self.dispatch(payment_event(&updated)).await;

        if next == PaymentStatus::Confirmed {
            // The confirmation is already committed; a failed close is
            // retried by the next confirmation or an explicit close.
            if let Err(e) = self.close_if_resolved(&updated.group_id, caller, now).await {
                error!("auto-close of group {} failed: {}", updated.group_id, e);
            }
        }
        Ok(updated)
    }

    async fn close_if_resolved(
        &self,
        group_id: &str,
        caller: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Period>, LedgerError> {
        let ledger = self.load_ledger(group_id).await?;
        let sheet = ledger.balances(DateRange::default())?;
        if !is_fully_resolved(&ledger.payments, &sheet) {
            debug!("group {} not yet resolved", group_id);
            return Ok(None);
        }
        let Some((from, to)) = settled_range(&ledger.expenses, &ledger.payments) else {
            return Ok(None);
        };

        let periods = self.storage.list_periods(group_id).await?;
        let period = match period_with_bounds(&periods, from, to) {
            Some(existing) if existing.status == PeriodStatus::Closed => {
                debug!("period {} already closed", existing.id);
                return Ok(None);
            }
            Some(existing) => self.mark_closed(existing.clone(), caller, now).await?,
            None => self.insert_closed(group_id, from, to, caller, now).await?,
        };
        let locked = self
            .lock_range(&ledger.expenses, from, to, LOCK_REASON_SETTLED, now)
            .await?;
        info!(
            "group {} fully settled, closed {}..{} and locked {} expenses",
            group_id, from, to, locked
        );
        Ok(Some(period))
    }

    async fn mark_closed(&self, period: Period, caller: &str, now: DateTime<Utc>) -> Result<Period, LedgerError> {
        let closed = Period {
            status: PeriodStatus::Closed,
            closed_at: Some(now),
            closed_by: Some(caller.to_string()),
            ..period
        };
        self.storage.update_period(closed.clone()).await?;
        Ok(closed)
    }

    async fn insert_closed(
        &self,
        group_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        caller: &str,
        now: DateTime<Utc>,
    ) -> Result<Period, LedgerError> {
        let period = Period {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            date_from: from,
            date_to: to,
            status: PeriodStatus::Closed,
            closed_at: Some(now),
            closed_by: Some(caller.to_string()),
        };
        self.storage.insert_period(period.clone()).await?;
        Ok(period)
    }

    async fn lock_range(
        &self,
        expenses: &[Expense],
        from: NaiveDate,
        to: NaiveDate,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, LedgerError> {
        let mut locked = 0;
        for expense in expenses_to_lock(expenses, from, to) {
            if self.storage.lock_expense(&expense.id, reason, now).await? {
                locked += 1;
            }
        }
        Ok(locked)
    }

    pub async fn close_period(
        &self,
        group_id: &str,
        caller: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<Period, LedgerError> {
        self.require_admin(group_id, caller).await?;
        if date_from > date_to {
            return Err(LedgerError::invalid_input(
                "date_to",
                format!("{} is before {}", date_to, date_from),
            ));
        }

        let periods = self.storage.list_periods(group_id).await?;
        let now = Utc::now();
        let period = match period_with_bounds(&periods, date_from, date_to) {
            Some(existing) if existing.status == PeriodStatus::Closed => {
                return Err(LedgerError::PeriodAlreadyClosed(existing.id.clone()));
            }
            Some(existing) => self.mark_closed(existing.clone(), caller, now).await?,
            None => self.insert_closed(group_id, date_from, date_to, caller, now).await?,
        };

        let expenses = self.storage.list_expenses(group_id).await?;
        let locked = self
            .lock_range(&expenses, date_from, date_to, LOCK_REASON_CLOSED, now)
            .await?;
        info!(
            "period {} ({}..{}) closed by {}, {} expenses locked",
            period.id, date_from, date_to, caller, locked
        );
        Ok(period)
    }

    /// Reopens a closed period. Expenses it locked stay locked.
    pub async fn reopen_period(&self, period_id: &str, caller: &str) -> Result<Period, LedgerError> {
        let period = self
            .storage
            .get_period(period_id)
            .await?
            .ok_or_else(|| LedgerError::PeriodNotFound(period_id.to_string()))?;
        self.require_admin(&period.group_id, caller).await?;
        if period.status == PeriodStatus::Open {
            return Err(LedgerError::PeriodAlreadyOpen(period_id.to_string()));
        }

        let reopened = Period {
            status: PeriodStatus::Open,
            closed_at: None,
            closed_by: None,
            ..period
        };
        self.storage.update_period(reopened.clone()).await?;
        info!("period {} reopened by {}", period_id, caller);
        Ok(reopened)
    }

    pub async fn add_expense(
        &self,
        group_id: &str,
        caller: &str,
        draft: ExpenseDraft,
    ) -> Result<ExpenseWithSplits, LedgerError> {
        self.require_member(group_id, caller).await?;
        self.require_counterparty(group_id, "paid_by", &draft.paid_by).await?;
        self.validate_string_input("category", &draft.category, 64, true)?;
        self.validate_string_input("description", &draft.description, 255, false)?;
        validate_amount("amount", draft.amount, self.money_scale)?;
        self.ensure_date_open(group_id, draft.date).await?;

        let members = self.storage.list_members(group_id).await?;
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            paid_by: draft.paid_by,
            amount: draft.amount,
            category: draft.category,
            description: draft.description,
            date: draft.date,
            locked: false,
            locked_reason: None,
            locked_at: None,
            created_at: Utc::now(),
        };
        let splits = build_splits(&expense.id, expense.amount, &draft.split, self.money_scale, &members)?;

        self.storage.insert_expense(expense.clone()).await?;
        if let Err(e) = self.insert_splits(&splits).await {
            warn!("split write for expense {} failed, removing it: {}", expense.id, e);
            if let Err(undo) = self.storage.purge_expense(&expense.id).await {
                error!("could not remove half-written expense {}: {}", expense.id, undo);
            }
            return Err(e);
        }
        // A period closed while the rows were being written wins over the add.
        if let Err(e) = self.ensure_date_open(group_id, expense.date).await {
            warn!("period closed under new expense {}, removing it: {}", expense.id, e);
            if let Err(undo) = self.storage.purge_expense(&expense.id).await {
                error!("could not remove expense {} from closed period: {}", expense.id, undo);
            }
            return Err(e);
        }

        info!(
            "expense {} added to {} by {}: {} paid {}",
            expense.id, group_id, caller, expense.paid_by, expense.amount
        );
        self.dispatch(LedgerEvent::ExpenseAdded {
            group_id: group_id.to_string(),
            expense_id: expense.id.clone(),
            paid_by: expense.paid_by.clone(),
            amount: expense.amount,
        })
        .await;
        Ok(ExpenseWithSplits { expense, splits })
    }

    async fn insert_splits(&self, splits: &[Split]) -> Result<(), LedgerError> {
        for split in splits {
            self.storage.insert_split(split.clone()).await?;
        }
        Ok(())
    }

    /// Puts an expense and its splits back the way they were after a failed
    /// rewrite.
    async fn restore_expense(&self, expense: &Expense, splits: &[Split]) {
        let restored = match self.storage.update_unlocked_expense(expense.clone()).await {
            Ok(_) => self.replace_splits(&expense.id, splits).await,
            Err(e) => Err(e),
        };
        if let Err(e) = restored {
            error!("could not restore expense {}: {}", expense.id, e);
        }
    }

    async fn replace_splits(&self, expense_id: &str, splits: &[Split]) -> Result<(), LedgerError> {
        self.storage.delete_splits(expense_id).await?;
        self.insert_splits(splits).await
    }

    /// A write that matched no unlocked row either lost a race with a lock or
    /// a delete.
    async fn unlocked_write_missed(&self, expense_id: &str) -> LedgerError {
        match self.storage.get_expense(expense_id).await {
            Ok(Some(_)) => LedgerError::ExpenseLocked(expense_id.to_string()),
            Ok(None) => LedgerError::ExpenseNotFound(expense_id.to_string()),
            Err(e) => e,
        }
    }

    pub async fn get_expense(&self, expense_id: &str, caller: &str) -> Result<ExpenseWithSplits, LedgerError> {
        let expense = self.require_expense(expense_id).await?;
        self.require_member(&expense.group_id, caller).await?;
        let splits = self.storage.list_splits(&[expense.id.clone()]).await?;
        Ok(ExpenseWithSplits { expense, splits })
    }

    pub async fn update_expense(
        &self,
        expense_id: &str,
        caller: &str,
        patch: ExpensePatch,
    ) -> Result<ExpenseWithSplits, LedgerError> {
        let current = self.require_expense(expense_id).await?;
        let group_id = current.group_id.clone();
        self.require_member(&group_id, caller).await?;
        if current.locked {
            return Err(LedgerError::ExpenseLocked(expense_id.to_string()));
        }

        let mut updated = current.clone();
        if let Some(paid_by) = patch.paid_by {
            self.require_counterparty(&group_id, "paid_by", &paid_by).await?;
            updated.paid_by = paid_by;
        }
        if let Some(category) = patch.category {
            self.validate_string_input("category", &category, 64, true)?;
            updated.category = category;
        }
        if let Some(description) = patch.description {
            self.validate_string_input("description", &description, 255, false)?;
            updated.description = description;
        }
        if let Some(amount) = patch.amount {
            validate_amount("amount", amount, self.money_scale)?;
            if amount != current.amount && patch.split.is_none() {
                return Err(LedgerError::invalid_input(
                    "split",
                    "a new split is required when the amount changes",
                ));
            }
            updated.amount = amount;
        }
        if let Some(date) = patch.date {
            updated.date = date;
        }
        self.ensure_date_open(&group_id, updated.date).await?;

        let previous_splits = self.storage.list_splits(&[expense_id.to_string()]).await?;
        let new_splits = match &patch.split {
            Some(request) => {
                let members = self.storage.list_members(&group_id).await?;
                Some(build_splits(expense_id, updated.amount, request, self.money_scale, &members)?)
            }
            None => None,
        };

        if !self.storage.update_unlocked_expense(updated.clone()).await? {
            return Err(self.unlocked_write_missed(expense_id).await);
        }
        let splits = match new_splits {
            Some(splits) => {
                if let Err(e) = self.replace_splits(expense_id, &splits).await {
                    warn!("split rewrite for expense {} failed, restoring: {}", expense_id, e);
                    self.restore_expense(&current, &previous_splits).await;
                    return Err(e);
                }
                splits
            }
            None => previous_splits.clone(),
        };
        if let Err(e) = self.ensure_date_open(&group_id, updated.date).await {
            warn!("period closed under update of expense {}, restoring: {}", expense_id, e);
            self.restore_expense(&current, &previous_splits).await;
            return Err(e);
        }

        info!("expense {} updated by {}", expense_id, caller);
        Ok(ExpenseWithSplits {
            expense: updated,
            splits,
        })
    }

    pub async fn delete_expense(&self, expense_id: &str, caller: &str) -> Result<(), LedgerError> {
        let expense = self.require_expense(expense_id).await?;
        self.require_member(&expense.group_id, caller).await?;
        if expense.locked {
            return Err(LedgerError::ExpenseLocked(expense_id.to_string()));
        }

        let splits = self.storage.list_splits(&[expense_id.to_string()]).await?;
        self.storage.delete_splits(expense_id).await?;
        match self.storage.delete_unlocked_expense(expense_id).await {
            Ok(true) => {
                info!("expense {} deleted by {}", expense_id, caller);
                Ok(())
            }
            Ok(false) => {
                if let Err(e) = self.insert_splits(&splits).await {
                    error!("could not restore splits of expense {}: {}", expense_id, e);
                }
                Err(self.unlocked_write_missed(expense_id).await)
            }
            Err(e) => {
                if let Err(undo) = self.insert_splits(&splits).await {
                    error!("could not restore splits of expense {}: {}", expense_id, undo);
                }
                Err(e)
            }
        }
    }
}

fn payment_event(payment: &Payment) -> LedgerEvent {
    let group_id = payment.group_id.clone();
    let payment_id = payment.id.clone();
    let from_user_id = payment.from_user_id.clone();
    let to_user_id = payment.to_user_id.clone();
    let amount = payment.amount;
    match payment.status {
        PaymentStatus::Confirmed => LedgerEvent::PaymentConfirmed {
            group_id,
            payment_id,
            from_user_id,
            to_user_id,
            amount,
        },
        PaymentStatus::Rejected => LedgerEvent::PaymentRejected {
            group_id,
            payment_id,
            from_user_id,
            to_user_id,
            amount,
        },
        PaymentStatus::Pending | PaymentStatus::PaymentSent => LedgerEvent::PaymentSent {
            group_id,
            payment_id,
            from_user_id,
            to_user_id,
            amount,
        },
    }
}
