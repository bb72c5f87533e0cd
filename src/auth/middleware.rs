//! Authentication Middleware
//! Mission: Gate protected endpoints on a valid bearer token

use crate::auth::{
    jwt::JwtHandler,
    models::{MessageResponse, SessionResponse},
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const BEARER_PREFIX: &str = "Bearer ";

/// What the Authorization header yielded
#[derive(Debug, PartialEq, Eq)]
pub enum BearerToken<'a> {
    Present(&'a str),
    Absent,
}

/// Pull a bearer token out of a raw header value. Anything that is not
/// `Bearer <token>` counts as absent.
pub fn parse_bearer(header: Option<&str>) -> BearerToken<'_> {
    match header
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
    {
        Some(token) if !token.is_empty() => BearerToken::Present(token),
        _ => BearerToken::Absent,
    }
}

/// Identity the gate attaches to an admitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    pub account_id: Uuid,
}

/// Why the gate refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    MissingToken,
    InvalidToken,
}

impl GateRejection {
    pub fn message(&self) -> &'static str {
        match self {
            GateRejection::MissingToken => "no token, authorization denied",
            GateRejection::InvalidToken => "token is not valid",
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(MessageResponse {
                message: self.message().to_string(),
            }),
        )
            .into_response()
    }
}

/// Admit-or-reject decision for a set of request headers
pub fn check_request(
    jwt_handler: &JwtHandler,
    headers: &HeaderMap,
) -> Result<AuthenticatedAccount, GateRejection> {
    let header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());

    let token = match parse_bearer(header) {
        BearerToken::Present(token) => token,
        BearerToken::Absent => return Err(GateRejection::MissingToken),
    };

    let account_id = jwt_handler.verify(token).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        GateRejection::InvalidToken
    })?;

    Ok(AuthenticatedAccount { account_id })
}

/// Auth middleware that validates JWT tokens
pub async fn auth_middleware(
    State(jwt_handler): State<Arc<JwtHandler>>,
    mut req: Request,
    next: Next,
) -> Result<Response, GateRejection> {
    let account = check_request(&jwt_handler, req.headers())?;

    // Add identity to request extensions so handlers can access it
    req.extensions_mut().insert(account);

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedAccount
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only present when the route sits behind auth_middleware.
        parts
            .extensions
            .get::<AuthenticatedAccount>()
            .copied()
            .ok_or(GateRejection::MissingToken)
    }
}

/// Token-only identity - GET /api/auth/session
pub async fn current_session(account: AuthenticatedAccount) -> Json<SessionResponse> {
    Json(SessionResponse {
        account_id: account.account_id,
    })
}
