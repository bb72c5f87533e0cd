//! Authentication API Endpoints
//! Mission: Provide register, login and current-account endpoints

use crate::auth::{
    middleware::{AuthenticatedAccount, GateRejection},
    models::{AccountResponse, AuthResponse, LoginRequest, MessageResponse, RegisterRequest},
    service::{AuthService, AuthSession, FlowError},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub service: AuthService,
}

impl AuthState {
    pub fn new(service: AuthService) -> Self {
        Self { service }
    }
}

fn session_response(session: AuthSession) -> Json<AuthResponse> {
    Json(AuthResponse {
        account_id: session.account_id,
        token: session.token.token,
        expires_at: session.token.expires_at,
    })
}

/// Register endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AuthState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!("Rejected register body: {}", e);
        AuthApiError::InvalidBody
    })?;

    info!("Registration attempt: {}", payload.handle);

    let session = state
        .service
        .register(&payload.handle, &payload.address, &payload.plaintext)
        .await?;

    Ok((StatusCode::CREATED, session_response(session)))
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!("Rejected login body: {}", e);
        AuthApiError::InvalidBody
    })?;

    let session = state
        .service
        .login(&payload.address, &payload.plaintext)
        .await?;

    Ok(session_response(session))
}

/// Get current account - GET /api/auth/me
pub async fn get_current_account(
    State(state): State<AuthState>,
    account: AuthenticatedAccount,
) -> Result<Json<AccountResponse>, AuthApiError> {
    let stored = state
        .service
        .store()
        .find_by_id(account.account_id)
        .await
        .map_err(|e| AuthApiError::from(FlowError::from(e)))?
        // A validly signed token for an account that no longer exists.
        .ok_or(AuthApiError::Gate(GateRejection::InvalidToken))?;

    Ok(Json(AccountResponse::from_account(&stored)))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    AccountExists,
    InvalidCredentials,
    MissingFields,
    PasswordTooLong,
    InvalidBody,
    Gate(GateRejection),
    InternalError,
}

impl From<FlowError> for AuthApiError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::Conflict => AuthApiError::AccountExists,
            FlowError::InvalidCredentials => AuthApiError::InvalidCredentials,
            FlowError::MissingFields => AuthApiError::MissingFields,
            FlowError::PasswordTooLong => AuthApiError::PasswordTooLong,
            FlowError::Server(e) => {
                error!("Auth flow failed: {:#}", e);
                AuthApiError::InternalError
            }
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::AccountExists => (StatusCode::BAD_REQUEST, "account already exists"),
            AuthApiError::InvalidCredentials => (StatusCode::BAD_REQUEST, "invalid credentials"),
            AuthApiError::MissingFields => (StatusCode::BAD_REQUEST, "missing required fields"),
            AuthApiError::PasswordTooLong => (StatusCode::BAD_REQUEST, "password too long"),
            AuthApiError::InvalidBody => (StatusCode::BAD_REQUEST, "invalid request body"),
            AuthApiError::Gate(rejection) => return rejection.into_response(),
            AuthApiError::InternalError => (StatusCode::INTERNAL_SERVER_ERROR, "server error"),
        };

        (
            status,
            Json(MessageResponse {
                message: message.to_string(),
            }),
        )
            .into_response()
    }
}
