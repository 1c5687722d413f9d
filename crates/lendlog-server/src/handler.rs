use axum::extract::State;
use axum::response::Json;
use lendlog_ledger::{
    AccountMatcher, ActiveBorrower, ActiveLoanView, BorrowerHistory, CatalogEntryView,
    LedgerReader, ProjectionBuilder, ReplayEngine,
};
use lendlog_store::AccountStatus;
use lendlog_types::{normalize_email, EventTime, LoanEvent};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::HistoryAccess;
use crate::error::{ServerError, ServerResult};
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub message: &'static str,
    pub books: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct LookupResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct CollateralResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<EventTime>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub student: String,
    #[serde(default)]
    pub book: String,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub student_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct StudentIdRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub student_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CollateralRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "cardData")]
    pub card_data: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminCollateralRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Catalog in file order with live availability.
pub async fn books_handler(State(state): State<SharedState>) -> ServerResult<Json<Vec<CatalogEntryView>>> {
    let events = state.ledger.read_all()?;
    let catalog = state.catalog();
    Ok(Json(ProjectionBuilder::compute_catalog_view(&catalog, &events)))
}

/// Borrowers currently holding at least one book.
pub async fn students_handler(State(state): State<SharedState>) -> ServerResult<Json<Vec<ActiveBorrower>>> {
    let events = state.ledger.read_all()?;
    Ok(Json(ProjectionBuilder::compute_active_borrowers(&events)))
}

pub async fn transaction_handler(
    State(state): State<SharedState>,
    Json(req): Json<TransactionRequest>,
) -> ServerResult<Json<SuccessResponse>> {
    let notice = state.record(&req.student, &req.book, &req.action)?;

    let hook = state.hook.clone();
    tokio::spawn(async move {
        if let Err(e) = hook.on_recorded(&notice).await {
            warn!(error = %e, book = %notice.book_title, "transaction hook failed");
        }
    });
    Ok(SuccessResponse::ok())
}

pub async fn user_status_handler(
    State(state): State<SharedState>,
    Json(req): Json<EmailRequest>,
) -> ServerResult<Json<AccountStatus>> {
    if req.email.trim().is_empty() {
        return Err(ServerError::BadRequest("Missing fields".into()));
    }
    Ok(Json(state.accounts.status(&req.email)?))
}

pub async fn register_handler(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> ServerResult<Json<SuccessResponse>> {
    state
        .accounts
        .register(&req.email, &req.password, &req.name, req.student_id.as_deref())?;
    Ok(SuccessResponse::ok())
}

/// A borrower's own history; the admin password unlocks any email.
pub async fn user_history_handler(
    State(state): State<SharedState>,
    Json(req): Json<CredentialsRequest>,
) -> ServerResult<Json<BorrowerHistory>> {
    if normalize_email(&req.email).is_empty() {
        return Ok(Json(BorrowerHistory::default()));
    }
    let access = HistoryAccess::resolve(&state.admin, &state.accounts, &req.email, &req.password)?;
    let matcher = AccountMatcher::new(access.email(), access.account_name());
    let events = state.ledger.read_all()?;
    Ok(Json(ProjectionBuilder::compute_borrower_history(&events, &matcher)))
}

pub async fn link_student_id_handler(
    State(state): State<SharedState>,
    Json(req): Json<StudentIdRequest>,
) -> ServerResult<Json<SuccessResponse>> {
    if state.accounts.link_student_id(&req.email, &req.student_id)? {
        Ok(SuccessResponse::ok())
    } else {
        Err(ServerError::NotFound("Account not found".into()))
    }
}

pub async fn lookup_student_id_handler(
    State(state): State<SharedState>,
    Json(req): Json<StudentIdRequest>,
) -> ServerResult<Json<LookupResponse>> {
    Ok(Json(match state.accounts.lookup_student_id(&req.student_id)? {
        Some((email, account)) => LookupResponse {
            found: true,
            email: Some(email),
            name: Some(account.name),
        },
        None => LookupResponse::default(),
    }))
}

pub async fn save_collateral_handler(
    State(state): State<SharedState>,
    Json(req): Json<CollateralRequest>,
) -> ServerResult<Json<SuccessResponse>> {
    let at = EventTime::from_naive(state.clock.now());
    state.collateral.save(&req.email, &req.card_data, at)?;
    Ok(SuccessResponse::ok())
}

/// Open loans with days held, days left and overdue/collateral flags.
pub async fn admin_active_handler(
    State(state): State<SharedState>,
    Json(req): Json<AdminRequest>,
) -> ServerResult<Json<Vec<ActiveLoanView>>> {
    state.admin.check(&req.password)?;
    let events = state.ledger.read_all()?;
    let collateral = state.collateral.index()?;
    let loans = ProjectionBuilder::admin_active_loans(
        &ReplayEngine::replay(&events),
        &collateral,
        &state.policy,
        state.clock.now(),
    );
    Ok(Json(loans))
}

pub async fn admin_history_handler(
    State(state): State<SharedState>,
    Json(req): Json<AdminRequest>,
) -> ServerResult<Json<Vec<LoanEvent>>> {
    state.admin.check(&req.password)?;
    let events = state.ledger.read_all()?;
    Ok(Json(ProjectionBuilder::full_history(&events)))
}

pub async fn admin_reload_handler(
    State(state): State<SharedState>,
    Json(req): Json<AdminRequest>,
) -> ServerResult<Json<ReloadResponse>> {
    state.admin.check(&req.password)?;
    let books = state.reload_catalog();
    Ok(Json(ReloadResponse {
        success: true,
        message: "Catalog Reloaded",
        books,
    }))
}

pub async fn admin_collateral_handler(
    State(state): State<SharedState>,
    Json(req): Json<AdminCollateralRequest>,
) -> ServerResult<Json<CollateralResponse>> {
    state.admin.check(&req.password)?;
    Ok(Json(match state.collateral.reveal(&req.email)? {
        Some(revealed) => CollateralResponse {
            found: true,
            details: Some(revealed.details),
            date: Some(revealed.updated),
        },
        None => CollateralResponse::default(),
    }))
}
