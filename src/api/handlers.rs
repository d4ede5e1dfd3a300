use crate::{
    api::{AppService, models::*},
    core::{
        errors::LedgerError,
        models::{
            expense::{ExpenseDraft, ExpensePatch, ExpenseWithSplits},
            payment::{Payment, PaymentAction},
            period::Period,
        },
        services::{BalanceReport, SettlementProposal},
    },
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
};
use http::header;

use std::sync::Arc;

// / Middleware to resolve the bearer token to a caller identity
async fn auth_middleware(
    State(service): State<Arc<AppService>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| LedgerError::Unauthenticated("Missing Authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| LedgerError::Unauthenticated("Invalid Authorization header".to_string()))?;

    let caller = service.authenticate(token)?;
    req.extensions_mut().insert(Caller(caller));
    Ok(next.run(req).await)
}

// Define API routes
pub fn api_routes(service: Arc<AppService>) -> Router {
    Router::new()
        .route("/groups/{group_id}/balances", get(get_balances))
        .route("/groups/{group_id}/settlement", get(propose_settlement))
        .route("/groups/{group_id}/payments", get(list_payments).post(create_payment))
        .route("/groups/{group_id}/expenses", post(add_expense))
        .route("/groups/{group_id}/periods", get(list_periods).post(close_period))
        .route("/payments/{payment_id}/{action}", post(transition_payment))
        .route(
            "/expenses/{expense_id}",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
        .route("/periods/{period_id}/reopen", post(reopen_period))
        .route_layer(middleware::from_fn_with_state(service.clone(), auth_middleware))
        .with_state(service)
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/balances",
    params(
        ("group_id" = String, Path, description = "ID of the group"),
        BalanceQuery
    ),
    responses(
        (status = 200, description = "Net balance per member", body = BalanceReport),
        (status = 403, description = "Caller is not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse),
        (status = 503, description = "No usable table shape", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_balances(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(group_id): Path<String>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceReport>, ApiError> {
    let report = service.get_balances(&group_id, &caller, query.range()).await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/settlement",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Suggested transfers", body = SettlementProposal),
        (status = 403, description = "Caller is not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn propose_settlement(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(group_id): Path<String>,
) -> Result<Json<SettlementProposal>, ApiError> {
    let proposal = service.propose_settlement(&group_id, &caller).await?;
    Ok(Json(proposal))
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/payments",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Payments of the group", body = Vec<Payment>),
        (status = 403, description = "Caller is not a group member", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn list_payments(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let payments = service.list_payments(&group_id, &caller).await?;
    Ok(Json(payments))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/payments",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = Payment),
        (status = 400, description = "Invalid amount or counterparty", body = ErrorResponse),
        (status = 403, description = "Caller is not the debtor", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn create_payment(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(group_id): Path<String>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let payment = if req.already_sent {
        service
            .record_payment_sent(&group_id, &caller, &req.from_user_id, &req.to_user_id, req.amount)
            .await?
    } else {
        service
            .create_pending_payment(&group_id, &caller, &req.from_user_id, &req.to_user_id, req.amount)
            .await?
    };
    Ok((StatusCode::CREATED, Json(payment)))
}

#[utoipa::path(
    post,
    path = "/api/payments/{payment_id}/{action}",
    params(
        ("payment_id" = String, Path, description = "ID of the payment"),
        ("action" = String, Path, description = "One of send, confirm, reject")
    ),
    responses(
        (status = 200, description = "Payment after the transition", body = Payment),
        (status = 403, description = "Caller may not apply this action", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse),
        (status = 409, description = "Transition not legal from the current status", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn transition_payment(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path((payment_id, action)): Path<(String, String)>,
) -> Result<Json<Payment>, ApiError> {
    let action = PaymentAction::parse(&action)
        .ok_or_else(|| LedgerError::invalid_input("action", format!("unknown payment action {}", action)))?;
    let payment = service.transition_payment(&payment_id, action, &caller).await?;
    Ok(Json(payment))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/expenses",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    request_body = ExpenseDraft,
    responses(
        (status = 201, description = "Expense and its splits", body = ExpenseWithSplits),
        (status = 400, description = "Invalid amount or split", body = ErrorResponse),
        (status = 403, description = "Caller is not a group member", body = ErrorResponse),
        (status = 423, description = "Date falls inside a closed period", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn add_expense(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(group_id): Path<String>,
    Json(draft): Json<ExpenseDraft>,
) -> Result<(StatusCode, Json<ExpenseWithSplits>), ApiError> {
    let expense = service.add_expense(&group_id, &caller, draft).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

#[utoipa::path(
    get,
    path = "/api/expenses/{expense_id}",
    params(
        ("expense_id" = String, Path, description = "ID of the expense")
    ),
    responses(
        (status = 200, description = "Expense and its splits", body = ExpenseWithSplits),
        (status = 404, description = "Expense not found", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn get_expense(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(expense_id): Path<String>,
) -> Result<Json<ExpenseWithSplits>, ApiError> {
    let expense = service.get_expense(&expense_id, &caller).await?;
    Ok(Json(expense))
}

#[utoipa::path(
    put,
    path = "/api/expenses/{expense_id}",
    params(
        ("expense_id" = String, Path, description = "ID of the expense")
    ),
    request_body = ExpensePatch,
    responses(
        (status = 200, description = "Updated expense", body = ExpenseWithSplits),
        (status = 400, description = "Invalid amount or split", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse),
        (status = 423, description = "Expense is locked", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn update_expense(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(expense_id): Path<String>,
    Json(patch): Json<ExpensePatch>,
) -> Result<Json<ExpenseWithSplits>, ApiError> {
    let expense = service.update_expense(&expense_id, &caller, patch).await?;
    Ok(Json(expense))
}

#[utoipa::path(
    delete,
    path = "/api/expenses/{expense_id}",
    params(
        ("expense_id" = String, Path, description = "ID of the expense")
    ),
    responses(
        (status = 204, description = "Expense deleted"),
        (status = 404, description = "Expense not found", body = ErrorResponse),
        (status = 423, description = "Expense is locked", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn delete_expense(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(expense_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    service.delete_expense(&expense_id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/groups/{group_id}/periods",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    responses(
        (status = 200, description = "Periods of the group", body = Vec<Period>),
        (status = 403, description = "Caller is not a group member", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn list_periods(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<Period>>, ApiError> {
    let periods = service.list_periods(&group_id, &caller).await?;
    Ok(Json(periods))
}

#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/periods",
    params(
        ("group_id" = String, Path, description = "ID of the group")
    ),
    request_body = ClosePeriodRequest,
    responses(
        (status = 200, description = "Closed period", body = Period),
        (status = 400, description = "Invalid date range", body = ErrorResponse),
        (status = 403, description = "Caller is not an owner or admin", body = ErrorResponse),
        (status = 409, description = "Period already closed", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn close_period(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(group_id): Path<String>,
    Json(req): Json<ClosePeriodRequest>,
) -> Result<Json<Period>, ApiError> {
    let period = service
        .close_period(&group_id, &caller, req.date_from, req.date_to)
        .await?;
    Ok(Json(period))
}

#[utoipa::path(
    post,
    path = "/api/periods/{period_id}/reopen",
    params(
        ("period_id" = String, Path, description = "ID of the period")
    ),
    responses(
        (status = 200, description = "Reopened period", body = Period),
        (status = 403, description = "Caller is not an owner or admin", body = ErrorResponse),
        (status = 404, description = "Period not found", body = ErrorResponse),
        (status = 409, description = "Period already open", body = ErrorResponse)
    ),
    security(("Bearer" = []))
)]
async fn reopen_period(
    State(service): State<Arc<AppService>>,
    Extension(Caller(caller)): Extension<Caller>,
    Path(period_id): Path<String>,
) -> Result<Json<Period>, ApiError> {
    let period = service.reopen_period(&period_id, &caller).await?;
    Ok(Json(period))
}
