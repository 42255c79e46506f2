//! Authentication middleware
//!
//! Verifies the bearer token and turns its claims into the explicit
//! [`ShopSession`] every handler acts under. Token issuance belongs to the
//! session service and is not handled here.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{ShopRole, ShopSession};
use uuid::Uuid;

use crate::error::{ErrorDetail, ErrorResponse};
use crate::AppState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Employee id
    pub sub: String,
    pub shop_id: String,
    #[serde(default)]
    pub role: ShopRole,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(shop_id: Uuid, employee_id: Uuid, role: ShopRole, ttl: chrono::Duration) -> Self {
        let now = chrono::Utc::now();
        Self {
            sub: employee_id.to_string(),
            shop_id: shop_id.to_string(),
            role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token.to_string(),
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let claims = match decode_jwt(&token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(msg) => return unauthorized_response(&msg),
    };

    let employee_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid employee ID in token"),
    };

    let shop_id = match Uuid::parse_str(&claims.shop_id) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid shop ID in token"),
    };

    let session = ShopSession::new(shop_id, employee_id, token).with_role(claims.role);
    request.extensions_mut().insert(session);

    next.run(request).await
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

fn unauthorized_response(message: &str) -> Response {
    tracing::debug!("Rejected request: {}", message);
    let error = ErrorResponse {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            field: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for the session of the authenticated shop employee
#[derive(Clone, Debug)]
pub struct CurrentShop(pub ShopSession);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentShop
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ShopSession>()
            .cloned()
            .map(CurrentShop)
            .ok_or_else(|| unauthorized_response("Authentication required"))
    }
}
