//! Authentication middleware
//!
//! Bearer JWT validation and the `CurrentUser` extractor. Token issuance lives
//! with the account service; this layer only verifies and unpacks.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::Role;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail with `Forbidden` unless the user holds one of `roles`
    pub fn require_role(&self, roles: &[Role]) -> AppResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "Role '{}' is not allowed to perform this action",
                self.role
            )))
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
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
        Some(token) => token,
        None => {
            return AppError::Unauthenticated("Missing or invalid Authorization header".into())
                .into_response();
        }
    };

    match authenticate(token, &state.config.jwt.secret) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Decode a bearer token into the acting user
pub fn authenticate(token: &str, secret: &str) -> AppResult<AuthUser> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthenticated(format!("Invalid token: {}", e)))?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthenticated("Invalid user ID in token".into()))?;

    Ok(AuthUser {
        user_id,
        role: claims.role,
    })
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthenticated("Authentication required".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(sub: &str, role: Role, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            role,
            exp: now + 3600,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let user_id = Uuid::new_v4();
        let user = authenticate(&token(&user_id.to_string(), Role::Staff, "s3cret"), "s3cret")
            .unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, Role::Staff);
    }

    #[test]
    fn test_wrong_secret_is_unauthenticated() {
        let t = token(&Uuid::new_v4().to_string(), Role::Staff, "one");
        assert!(matches!(
            authenticate(&t, "two"),
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_bad_subject_is_unauthenticated() {
        let t = token("not-a-uuid", Role::Technician, "s3cret");
        assert!(matches!(
            authenticate(&t, "s3cret"),
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_role_guard() {
        let technician = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Technician,
        };
        assert!(technician.require_role(Role::CHECKLIST_AUTHORS).is_ok());
        assert!(matches!(
            technician.require_role(Role::CHECKLIST_APPROVERS),
            Err(AppError::Forbidden(_))
        ));
    }
}
