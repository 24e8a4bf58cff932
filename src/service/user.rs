use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::domain::owner_model::Owner;
use crate::error::AppError;
use crate::service::{check_password, hash_password};
use crate::utils::jwt::{Claims, gen_token};
use crate::utils::state::AppState;
use crate::utils::validation::is_valid_username;

#[derive(Serialize)]
pub struct OwnerProfile {
    id: String,
    username: String,
    email: String,
}

impl From<&Owner> for OwnerProfile {
    fn from(owner: &Owner) -> Self {
        OwnerProfile {
            id: owner.id.clone(),
            username: owner.username.clone(),
            email: owner.email.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct AuthRes {
    token: String,
    user: OwnerProfile,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReq {
    username: String,
    email: String,
    password: String,
    confirm_password: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterReq>,
) -> Result<impl IntoResponse, AppError> {
    if req.username.is_empty()
        || req.email.is_empty()
        || req.password.is_empty()
        || req.confirm_password.is_empty()
    {
        return Err(AppError::Validation("Please fill all fields".to_string()));
    }
    if req.password != req.confirm_password {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }
    if !is_valid_username(&req.username) {
        return Err(AppError::Validation(format!(
            "invalid username: {}",
            req.username
        )));
    }
    if !req.email.contains('@') {
        return Err(AppError::Validation(format!("invalid email: {}", req.email)));
    }
    if state.owners.query_owner_by_name(&req.username).await.is_ok() {
        return Err(AppError::UsernameTaken(req.username));
    }
    if state.owners.query_owner_by_email(&req.email).await.is_ok() {
        return Err(AppError::EmailTaken(req.email));
    }

    let owner = Owner::new(req.username, req.email, hash_password(&req.password)?);
    state.owners.insert_owner(&owner).await?;

    let token = gen_token(&state.config, &owner.id);
    Ok((
        StatusCode::CREATED,
        Json(AuthRes {
            token,
            user: OwnerProfile::from(&owner),
        }),
    ))
}

#[derive(Deserialize, Debug)]
pub struct LoginReq {
    identifier: String,
    password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginReq>,
) -> Result<impl IntoResponse, AppError> {
    if req.identifier.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Please enter both identifier and password".to_string(),
        ));
    }

    let owner = state
        .owners
        .query_owner_by_login(&req.identifier)
        .await
        .map_err(|_| AppError::InvalidCredentials)?;

    {
        // bcrypt verification is slow enough to keep off the async workers.
        let hash = owner.password.clone();
        let password = req.password.clone();
        tokio::task::spawn_blocking(move || check_password(&hash, &password))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;
    }

    let token = gen_token(&state.config, &owner.id);
    Ok(Json(AuthRes {
        token,
        user: OwnerProfile::from(&owner),
    }))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountReq {
    current_password: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    new_password: Option<String>,
    #[serde(default)]
    confirm_password: Option<String>,
}

pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateAccountReq>,
) -> Result<impl IntoResponse, AppError> {
    if req.current_password.is_empty() {
        return Err(AppError::Validation(
            "Current password is required.".to_string(),
        ));
    }

    let mut owner = state.owners.query_owner_by_id(&claims.sub).await?;
    check_password(&owner.password, &req.current_password)?;

    if let Some(new_password) = &req.new_password {
        if req.confirm_password.as_deref() != Some(new_password.as_str()) {
            return Err(AppError::Validation(
                "New passwords do not match.".to_string(),
            ));
        }
        owner.password = hash_password(new_password)?;
    }
    if let Some(email) = req.email.filter(|e| !e.is_empty()) {
        if !email.contains('@') {
            return Err(AppError::Validation(format!("invalid email: {email}")));
        }
        owner.email = email;
    }
    if let Some(username) = req.username.filter(|u| !u.is_empty() && *u != owner.username) {
        if !is_valid_username(&username) {
            return Err(AppError::Validation(format!("invalid username: {username}")));
        }
        if state.owners.query_owner_by_name(&username).await.is_ok() {
            return Err(AppError::UsernameTaken(username));
        }
        owner.username = username;
    }

    state.owners.update_account(&owner).await?;
    Ok(Json(
        serde_json::json!({ "message": "Account updated successfully." }),
    ))
}

pub async fn list_owners(
    State(state): State<Arc<AppState>>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let owners = state.owners.list_owners().await?;
    Ok(Json(
        owners.iter().map(OwnerProfile::from).collect::<Vec<_>>(),
    ))
}
