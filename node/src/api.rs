//! # HTTP API
//!
//! The axum router in front of [`WalletService`]. Handlers only translate:
//! request shapes in, wallet calls, response shapes out. Every failure is a
//! [`WalletError`] rendered as `{ "error", "code" }` with a status picked
//! from its kind.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                       |
//! |--------|------------------------|-----------------------------------|
//! | GET    | `/health`              | Liveness check                    |
//! | GET    | `/metrics`             | Prometheus text exposition        |
//! | POST   | `/solana/generate`     | Create the vault, return address  |
//! | GET    | `/solana/balance`      | SOL, USDC and fiat value          |
//! | GET    | `/solana/transactions` | Filtered ledger with totals       |
//! | POST   | `/solana/pay/usdc`     | Send USDC                         |
//! | POST   | `/solana/pay/sol`      | Send SOL                          |

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use cwt_wallet::ledger::{Direction, LedgerFilter, LedgerReport};
use cwt_wallet::{BalanceReport, Currency, WalletError, WalletService};

use crate::metrics::SharedMetrics;
use crate::password::PasswordStore;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WalletService>,
    pub password: Arc<PasswordStore>,
    pub metrics: SharedMetrics,
}

impl AppState {
    fn observe(&self, err: &WalletError) {
        if matches!(err, WalletError::UpstreamUnavailable { .. }) {
            self.metrics.upstream_failures_total.inc();
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/solana/generate", post(generate_handler))
        .route("/solana/balance", get(balance_handler))
        .route("/solana/transactions", get(transactions_handler))
        .route("/solana/pay/usdc", post(pay_usdc_handler))
        .route("/solana/pay/sol", post(pay_sol_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub message: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub to_address: String,
    pub amount: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayResponse {
    pub tx_id: String,
}

/// Query string of `GET /solana/transactions`. Empty values count as
/// absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    #[serde(rename = "type")]
    pub direction: Option<String>,
    pub tx_id: Option<String>,
    /// `YYYY-MM-DD`, start of day UTC.
    pub from: Option<String>,
    /// `YYYY-MM-DD`, end of day UTC.
    pub to: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub currency: Option<String>,
}

impl TransactionsQuery {
    pub fn into_filter(self) -> Result<LedgerFilter, WalletError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        Ok(LedgerFilter {
            direction: present(self.direction)
                .map(|s| s.parse::<Direction>())
                .transpose()?,
            tx_id: present(self.tx_id),
            currency: present(self.currency)
                .map(|s| s.parse::<Currency>())
                .transpose()?,
            from: present(self.from)
                .map(|s| parse_day(&s, "from", NaiveTime::MIN))
                .transpose()?,
            to: present(self.to)
                .map(|s| parse_day(&s, "to", end_of_day()))
                .transpose()?,
            min_amount: present(self.min_amount),
            max_amount: present(self.max_amount),
        })
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

fn parse_day(text: &str, field: &str, time: NaiveTime) -> Result<DateTime<Utc>, WalletError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map(|date| date.and_time(time).and_utc())
        .map_err(|_| WalletError::InvalidFilter {
            reason: format!("invalid {field} date: use YYYY-MM-DD (e.g. 2006-01-02)"),
        })
}

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub enum ApiError {
    Wallet(WalletError),
    /// The request body could not be decoded.
    BadRequest(String),
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        Self::Wallet(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// HTTP status for each wallet error kind.
pub fn status_for(err: &WalletError) -> StatusCode {
    match err {
        WalletError::DestinationExists { .. } => StatusCode::CONFLICT,
        WalletError::InvalidAmountFormat { .. }
        | WalletError::InvalidAddress { .. }
        | WalletError::InvalidFilter { .. }
        | WalletError::InvalidExtension { .. } => StatusCode::BAD_REQUEST,
        WalletError::InvalidPassword | WalletError::PasswordRequired => StatusCode::UNAUTHORIZED,
        WalletError::InsufficientBalance { .. }
        | WalletError::TokenAccountNotProvisioned { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        WalletError::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
        WalletError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        WalletError::MissingOrEmptyFile { .. }
        | WalletError::InvalidVaultFile { .. }
        | WalletError::KeyMismatch
        | WalletError::Crypto
        | WalletError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Wallet(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    warn!(error = %err, code = err.kind(), "request failed");
                }
                (
                    status,
                    ErrorResponse {
                        error: err.to_string(),
                        code: err.kind().to_string(),
                    },
                )
            }
            Self::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: reason,
                    code: "BAD_REQUEST".to_string(),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`. Does not touch the vault or the chain.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    crate::metrics::render(&state.metrics)
}

/// `POST /solana/generate`. Uses the password typed at startup.
async fn generate_handler(State(state): State<AppState>) -> Result<Json<GenerateResponse>, ApiError> {
    let password = state.password.get()?;
    let address = state.service.generate(&password).await?;

    info!(address = %address, "wallet generated");
    Ok(Json(GenerateResponse {
        success: true,
        message: "Wallet generated successfully".to_string(),
        address,
    }))
}

async fn balance_handler(State(state): State<AppState>) -> Result<Json<BalanceReport>, ApiError> {
    state
        .service
        .balance()
        .await
        .map(Json)
        .map_err(|e| {
            state.observe(&e);
            e.into()
        })
}

async fn transactions_handler(
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<LedgerReport>, ApiError> {
    state.metrics.ledger_requests_total.inc();
    let filter = query.into_filter()?;

    state
        .service
        .transactions(&filter)
        .await
        .map(Json)
        .map_err(|e| {
            state.observe(&e);
            e.into()
        })
}

async fn pay_usdc_handler(
    State(state): State<AppState>,
    body: Result<Json<PayRequest>, JsonRejection>,
) -> Result<Json<PayResponse>, ApiError> {
    pay(state, Currency::Usdc, body?.0).await
}

async fn pay_sol_handler(
    State(state): State<AppState>,
    body: Result<Json<PayRequest>, JsonRejection>,
) -> Result<Json<PayResponse>, ApiError> {
    pay(state, Currency::Sol, body?.0).await
}

async fn pay(
    state: AppState,
    currency: Currency,
    req: PayRequest,
) -> Result<Json<PayResponse>, ApiError> {
    let result = match state.password.get() {
        Ok(password) => {
            state
                .service
                .pay(currency, &req.to_address, &req.amount, &password)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(tx_id) => {
            state.metrics.record_payment(currency);
            Ok(Json(PayResponse { tx_id }))
        }
        Err(e) => {
            state.observe(&e);
            state.metrics.record_rejection(currency, e.kind());
            Err(e.into())
        }
    }
}
