use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        extractors::AuthUser,
        gate::{access_gate, AccessGate, RoutePolicy},
        jwt::JwtKeys,
        services::{issue_session, register as register_user, validate_credentials, Registration},
    },
    error::AppError,
    extract::AppJson,
    state::AppState,
};

pub fn auth_routes(keys: JwtKeys) -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route_layer(from_fn_with_state(
            AccessGate::new(keys, RoutePolicy::PUBLIC),
            access_gate,
        ))
}

pub fn me_routes(keys: JwtKeys) -> Router<AppState> {
    Router::new().route("/me", get(get_me)).route_layer(from_fn_with_state(
        AccessGate::new(keys, RoutePolicy::AUTHENTICATED),
        access_gate,
    ))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let registration = Registration {
        email: payload.email,
        password: payload.password,
        first_name: payload.first_name,
        last_name: payload.last_name,
        role: payload.role,
    };

    let user = match register_user(state.users.as_ref(), registration).await {
        Ok(u) => u,
        Err(e @ (AppError::Conflict(_) | AppError::BadRequest(_))) => return Err(e),
        Err(e) => {
            error!(error = %e, "registration failed");
            return Err(AppError::Internal(anyhow::anyhow!("Failed to register user")));
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let access_token = issue_session(&keys, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::bearer(access_token, PublicUser::from(user))),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = payload.email.trim();

    let Some(user) = validate_credentials(state.users.as_ref(), email, &payload.password).await?
    else {
        warn!("login rejected");
        return Err(AppError::Unauthenticated("Invalid credentials".into()));
    };

    let keys = JwtKeys::from_ref(&state);
    let access_token = issue_session(&keys, &user)?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(AuthResponse::bearer(access_token, PublicUser::from(user))))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = identity.user_id, "token subject no longer exists");
            AppError::NotFound("User not found".into())
        })?;

    Ok(Json(PublicUser::from(user)))
}

#[cfg(test)]
mod me_tests {
    use super::*;
    use crate::auth::repo_types::Role;
    use time::OffsetDateTime;

    #[test]
    fn test_public_user_serialization_omits_password() {
        let now = OffsetDateTime::now_utc();
        let user = crate::auth::repo_types::User {
            id: 3,
            email: "test@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            first_name: "Test".into(),
            last_name: "User".into(),
            is_active: true,
            role: Role::User,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"firstName\":\"Test\""));
        assert!(json.contains("\"role\":\"USER\""));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }
}
