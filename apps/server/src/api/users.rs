use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
    models::{ListUsersParams, NewUser, User, UserPage, UserUpdate},
};
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use rand::rngs::OsRng;
use userfeed_core::users::UserServiceTrait;

#[utoipa::path(get, path = "/api/v1/users", params(ListUsersParams), responses((status = 200, body = UserPage)))]
pub(crate) async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListUsersParams>,
) -> ApiResult<Json<UserPage>> {
    let page = state.user_service.list_users(&params.into())?;
    Ok(Json(UserPage::from(page)))
}

#[utoipa::path(get, path = "/api/v1/users/{id}", params(("id" = String, Path, description = "User id")), responses((status = 200, body = User), (status = 404)))]
pub(crate) async fn get_user(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<User>> {
    let user = state.user_service.get_user(&id)?;
    Ok(Json(User::from(user)))
}

#[utoipa::path(post, path = "/api/v1/users", request_body = NewUser, responses((status = 201, body = User), (status = 400)))]
pub(crate) async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(mut payload): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let password = std::mem::take(&mut payload.password);
    if password.is_empty() {
        return Err(ApiError::BadRequest("password is required".to_string()));
    }
    let hashed_password = hash_password(password).await?;

    let created = state
        .user_service
        .create_user(payload.into_core(hashed_password))
        .await?;
    tracing::info!("Created user {}", created.id);
    Ok((StatusCode::CREATED, Json(User::from(created))))
}

#[utoipa::path(put, path = "/api/v1/users/{id}", params(("id" = String, Path, description = "User id")), request_body = UserUpdate, responses((status = 200, body = User), (status = 404)))]
pub(crate) async fn update_user(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UserUpdate>,
) -> ApiResult<Json<User>> {
    let updated = state.user_service.update_user(payload.into_core(id)).await?;
    Ok(Json(User::from(updated)))
}

#[utoipa::path(delete, path = "/api/v1/users/{id}", params(("id" = String, Path, description = "User id")), responses((status = 204), (status = 404)))]
pub(crate) async fn delete_user(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    state.user_service.delete_user(&id).await?;
    tracing::info!("Deleted user {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Hashes a password with argon2 off the async runtime.
async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .map_err(|e| ApiError::Internal(format!("failed to hash password: {}", e)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}
