//! User directory endpoints

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};
use crate::users::{NewUser, PublicUser};

/// Login attempt
#[derive(Debug, Default, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    id: String,

    #[serde(default)]
    pw: String,
}

/// User creation, authorized by the admin credentials in the body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserRequest {
    #[serde(default)]
    admin_id: String,

    #[serde(default)]
    admin_pw: String,

    #[serde(default)]
    id: String,

    #[serde(default)]
    pw: String,

    #[serde(default)]
    role: Option<String>,
}

/// User removal, authorized by the admin credentials in the body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserRequest {
    #[serde(default)]
    admin_id: String,

    #[serde(default)]
    admin_pw: String,

    #[serde(default)]
    id: String,
}

/// Request body, or the empty default when it is missing or not valid JSON.
///
/// An empty body then fails the credential check like any wrong login, so
/// every answer keeps the `{"ok": .., "error": ..}` shape.
fn body_or_default<T: Default>(body: Option<Json<T>>) -> T {
    body.map(|Json(body)| body).unwrap_or_default()
}

/// GET /api/users
pub async fn list_users(State(state): State<ApiState>) -> Json<Vec<PublicUser>> {
    Json(state.users.public_users().await)
}

/// POST /api/auth
pub async fn authenticate(
    State(state): State<ApiState>,
    body: Option<Json<AuthRequest>>,
) -> ApiResult<Json<Value>> {
    let request = body_or_default(body);
    let user = state
        .users
        .authenticate(&request.id, &request.pw)
        .await
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    Ok(Json(json!({ "ok": true, "user": user })))
}

/// POST /api/users
pub async fn add_user(
    State(state): State<ApiState>,
    body: Option<Json<AddUserRequest>>,
) -> ApiResult<Json<Value>> {
    let request = body_or_default(body);
    let new_user = NewUser {
        id: request.id,
        pw: request.pw,
        role: request.role,
    };

    state
        .users
        .add_user(&request.admin_id, &request.admin_pw, new_user)
        .await?;

    Ok(Json(json!({ "ok": true })))
}

/// POST /api/users/delete
pub async fn delete_user(
    State(state): State<ApiState>,
    body: Option<Json<DeleteUserRequest>>,
) -> ApiResult<Json<Value>> {
    let request = body_or_default(body);
    state
        .users
        .remove_user(&request.admin_id, &request.admin_pw, &request.id)
        .await?;

    Ok(Json(json!({ "ok": true })))
}
