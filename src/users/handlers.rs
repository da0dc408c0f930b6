use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::dto::{AdminUserUpdate, UpdateMeRequest};
use crate::{
    auth::{
        repo_types::ProfileUpdate,
        services::{validate_email, validate_name},
        AdminOnly, CurrentUser, RequireRole,
    },
    envelope,
    error::{AppError, Result},
    http::parse_id,
    state::AppState,
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route("/users/updateMe", patch(update_me))
        .route("/users/deleteMe", axum::routing::delete(delete_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

fn not_found() -> AppError {
    AppError::NotFound("No user found with that ID".into())
}

/// Validated, normalized name and email; absent fields stay absent.
fn profile_fields(
    name: Option<String>,
    email: Option<String>,
) -> Result<(Option<String>, Option<String>)> {
    let name = name.as_deref().map(validate_name).transpose()?;
    let email = email.as_deref().map(validate_email).transpose()?;
    Ok((name, email))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<Value> {
    envelope::one(user)
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateMeRequest>,
) -> Result<Json<Value>> {
    if payload.touches_password() {
        warn!("password change attempted through updateMe");
        return Err(AppError::BadRequest(
            "This route is not for password updates. Please use /updateMyPassword.".into(),
        ));
    }
    let (name, email) = profile_fields(payload.name, payload.email)?;
    let updated = state
        .users
        .update_profile(
            user.id,
            ProfileUpdate {
                name,
                email,
                role: None,
            },
        )
        .await?
        .ok_or_else(not_found)?;

    info!("profile updated");
    Ok(envelope::keyed("user", updated))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode> {
    state.users.deactivate(user.id).await?;
    info!("account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: RequireRole<AdminOnly>,
) -> Result<Json<Value>> {
    let users = state.users.list().await?;
    Ok(envelope::many(users))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: RequireRole<AdminOnly>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_id(&id)?;
    let user = state.users.find_by_id(id).await?.ok_or_else(not_found)?;
    Ok(envelope::one(user))
}

#[instrument(skip(state, _admin, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    _admin: RequireRole<AdminOnly>,
    Path(id): Path<String>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<Value>> {
    let id = parse_id(&id)?;
    let (name, email) = profile_fields(payload.name, payload.email)?;
    let user = state
        .users
        .update_profile(
            id,
            ProfileUpdate {
                name,
                email,
                role: payload.role,
            },
        )
        .await?
        .ok_or_else(not_found)?;
    info!(user_id = %id, "user updated by admin");
    Ok(envelope::one(user))
}

#[instrument(skip(state, _admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    _admin: RequireRole<AdminOnly>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id)?;
    if !state.users.deactivate(id).await? {
        return Err(not_found());
    }
    info!(user_id = %id, "user deactivated by admin");
    Ok(StatusCode::NO_CONTENT)
}
