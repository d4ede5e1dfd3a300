mod api_tests;
mod payment_tests;

use crate::api::AppService;
use crate::auth::jwt::JwtService;
use crate::core::models::{
    expense::{ExpenseDraft, ExpenseWithSplits, SplitRequest},
    group::{Group, Member, Role},
    payment::{Payment, PaymentAction},
};
use crate::core::money::DEFAULT_MONEY_SCALE;
use crate::core::services::LedgerService;
use crate::infrastructure::cache::in_memory::InMemoryShapeCache;
use crate::infrastructure::notifications::in_memory::InMemoryNotifier;
use crate::infrastructure::schema::ShapeCatalog;
use crate::infrastructure::storage::Storage;
use crate::infrastructure::storage::shaped::{ShapedStorage, standard_store};
use crate::infrastructure::store::in_memory::InMemoryStore;
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub const TEST_SECRET: &str = "test-secret";
pub const GROUP: &str = "trip";

pub fn create_test_service() -> AppService {
    create_service_with(standard_store(), DEFAULT_MONEY_SCALE)
}

pub fn create_service_with(store: InMemoryStore, money_scale: u32) -> AppService {
    let storage = ShapedStorage::new(store, InMemoryShapeCache::new(), ShapeCatalog::standard().unwrap());
    LedgerService::new(
        storage,
        InMemoryNotifier::new(),
        JwtService::new(TEST_SECRET.to_string()),
        money_scale,
    )
}

/// Store laid out with the original `divvy_*` tables only.
pub fn legacy_store() -> InMemoryStore {
    InMemoryStore::new()
        .with_table(
            "divvies",
            &["id", "name", "created_by", "archived", "archive_suggested_at", "last_global_confirmation_at"],
        )
        .with_table("divvy_members", &["id", "divvy_id", "user_id", "role"])
        .with_unique("divvy_members", &["divvy_id", "user_id"])
        .with_table(
            "divvy_expenses",
            &[
                "id",
                "divvy_id",
                "paid_by",
                "amount",
                "category",
                "description",
                "date",
                "locked",
                "locked_reason",
                "locked_at",
                "created_at",
            ],
        )
        .with_table("divvy_expense_splits", &["id", "expense_id", "user_id", "amount"])
        .with_table("transactions", LEGACY_PAYMENT_COLUMNS)
        .with_table(
            "divvy_periods",
            &["id", "divvy_id", "date_from", "date_to", "status", "closed_at", "closed_by"],
        )
}

pub const LEGACY_PAYMENT_COLUMNS: &[&str] = &[
    "id",
    "divvy_id",
    "from_user",
    "to_user",
    "amount",
    "status",
    "created_at",
    "updated_at",
    "paid_at",
];

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub async fn seed_group(service: &AppService, group_id: &str, members: &[(&str, Role)]) {
    let owner = members.first().map(|(id, _)| id.to_string()).unwrap_or_default();
    service
        .storage()
        .save_group(Group {
            id: group_id.to_string(),
            name: format!("{} group", group_id),
            created_by: owner,
            archived: false,
            archive_suggested_at: None,
            last_global_confirmation_at: None,
        })
        .await
        .unwrap();
    for (user_id, role) in members {
        service
            .storage()
            .add_member(Member {
                id: format!("{}-{}", group_id, user_id),
                group_id: group_id.to_string(),
                user_id: user_id.to_string(),
                role: *role,
            })
            .await
            .unwrap();
    }
}

/// Group `trip` with owner `a` and members `b` and `c`.
pub async fn seed_trip(service: &AppService) {
    seed_group(
        service,
        GROUP,
        &[("a", Role::Owner), ("b", Role::Member), ("c", Role::Member)],
    )
    .await;
}

pub fn equal_draft(paid_by: &str, amount: Decimal, on: NaiveDate, participants: &[&str]) -> ExpenseDraft {
    ExpenseDraft {
        paid_by: paid_by.to_string(),
        amount,
        category: "food".to_string(),
        description: "dinner".to_string(),
        date: on,
        split: SplitRequest::Equal {
            participants: participants.iter().map(|p| p.to_string()).collect(),
        },
    }
}

pub async fn add_equal_expense(
    service: &AppService,
    paid_by: &str,
    amount: Decimal,
    on: NaiveDate,
    participants: &[&str],
) -> ExpenseWithSplits {
    service
        .add_expense(GROUP, paid_by, equal_draft(paid_by, amount, on, participants))
        .await
        .unwrap()
}

/// Creates a payment from `from` to `to` and confirms it.
pub async fn settle(service: &AppService, from: &str, to: &str, amount: Decimal) -> Payment {
    let payment = service
        .record_payment_sent(GROUP, from, from, to, amount)
        .await
        .unwrap();
    service
        .transition_payment(&payment.id, PaymentAction::Confirm, to)
        .await
        .unwrap()
}
