use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        extractors::AuthUser,
        gate::{access_gate, AccessGate, RoutePolicy},
        jwt::JwtKeys,
    },
    classes::{
        dto::{ClassDetails, ClassQuery, CreateClassRequest, EnrollRequest, UpdateClassRequest},
        repo_types::{Class, Enrollment},
        services,
    },
    error::AppError,
    extract::{optional_json, AppJson, AppPath},
    state::AppState,
};

// --- route groups ---

pub fn read_routes(keys: JwtKeys) -> Router<AppState> {
    Router::new()
        .route("/classes", get(list_classes))
        .route("/classes/:id", get(get_class))
        .route_layer(from_fn_with_state(
            AccessGate::new(keys, RoutePolicy::PUBLIC),
            access_gate,
        ))
}

pub fn admin_routes(keys: JwtKeys) -> Router<AppState> {
    Router::new()
        .route("/classes", post(create_class))
        .route("/classes/:id", put(update_class).delete(delete_class))
        .route_layer(from_fn_with_state(
            AccessGate::new(keys, RoutePolicy::ADMIN),
            access_gate,
        ))
}

pub fn enrollment_routes(keys: JwtKeys) -> Router<AppState> {
    Router::new()
        .route("/classes/:id/enroll", post(enroll))
        .route_layer(from_fn_with_state(
            AccessGate::new(keys, RoutePolicy::AUTHENTICATED),
            access_gate,
        ))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_classes(
    State(state): State<AppState>,
    Query(query): Query<ClassQuery>,
) -> Result<Json<Vec<ClassDetails>>, AppError> {
    let filter = query.into_filter();
    let classes = services::list_classes(state.classes.as_ref(), &filter).await?;
    Ok(Json(classes))
}

#[instrument(skip(state))]
pub async fn get_class(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<Json<ClassDetails>, AppError> {
    Ok(Json(services::get_class(state.classes.as_ref(), id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_class(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    AppJson(payload): AppJson<CreateClassRequest>,
) -> Result<(StatusCode, Json<Class>), AppError> {
    tracing::debug!(admin_id = admin.user_id, "creating class");
    let class = services::create_class(state.classes.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

#[instrument(skip(state, payload))]
pub async fn update_class(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<UpdateClassRequest>,
) -> Result<Json<Class>, AppError> {
    Ok(Json(
        services::update_class(state.classes.as_ref(), id, payload).await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_class(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    services::delete_class(state.classes.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /classes/:id/enroll`; an empty body enrolls the caller as PENDING.
#[instrument(skip(state, body))]
pub async fn enroll(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppPath(class_id): AppPath<i32>,
    body: Bytes,
) -> Result<(StatusCode, Json<Enrollment>), AppError> {
    let req: EnrollRequest = optional_json(&body)?;
    let user_id = services::resolve_candidate(req.user_id, &caller);
    let enrollment =
        services::enroll(state.classes.as_ref(), class_id, user_id, req.status).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}
