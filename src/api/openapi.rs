use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::{
    api::models::{ClosePeriodRequest, CreatePaymentRequest, ErrorResponse},
    core::{
        balance::MemberBalance,
        errors::ErrorKind,
        models::{
            expense::{Expense, ExpenseDraft, ExpensePatch, ExpenseWithSplits, Share, Split, SplitRequest},
            payment::{Payment, PaymentStatus},
            period::{Period, PeriodStatus},
        },
        services::{BalanceReport, SettlementProposal},
        settlement::Transfer,
    },
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        super::handlers::get_balances,
        super::handlers::propose_settlement,
        super::handlers::list_payments,
        super::handlers::create_payment,
        super::handlers::transition_payment,
        super::handlers::add_expense,
        super::handlers::get_expense,
        super::handlers::update_expense,
        super::handlers::delete_expense,
        super::handlers::list_periods,
        super::handlers::close_period,
        super::handlers::reopen_period
    ),
    components(schemas(
        CreatePaymentRequest,
        ClosePeriodRequest,
        ErrorResponse,
        ErrorKind,
        BalanceReport,
        MemberBalance,
        SettlementProposal,
        Transfer,
        Payment,
        PaymentStatus,
        Expense,
        ExpenseDraft,
        ExpensePatch,
        ExpenseWithSplits,
        Split,
        SplitRequest,
        Share,
        Period,
        PeriodStatus
    )),
    modifiers(&BearerAuth),
    info(
        title = "Divvy Ledger API",
        description = "Balances, settlement suggestions, payment confirmation and period locking for shared-expense groups",
        version = "0.1.0"
    )
)]
pub struct ApiDoc;
