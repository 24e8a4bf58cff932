use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

use crate::domain::owner_model::Owner;
use crate::error::AppError;
use crate::lifecycle::FilePayload;
use crate::utils::jwt::Claims;
use crate::utils::state::AppState;

/// Multipart form decoded into the one file part plus any text fields.
/// The lifecycle layer only ever sees raw bytes and the original filename.
async fn read_form(
    mut multipart: Multipart,
) -> Result<(Option<FilePayload>, HashMap<String, String>), AppError> {
    let mut file = None;
    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(|s| s.to_string());
        match filename {
            Some(filename) => {
                let bytes = field.bytes().await?.to_vec();
                file = Some(FilePayload { bytes, filename });
            }
            None => {
                fields.insert(name, field.text().await?);
            }
        }
    }
    Ok((file, fields))
}

fn required_file(file: Option<FilePayload>) -> Result<FilePayload, AppError> {
    file.ok_or_else(|| AppError::Validation("Upload failed or invalid file".to_string()))
}

// imageName may arrive as a query parameter or a form field.
fn image_name(
    params: &HashMap<String, String>,
    fields: &HashMap<String, String>,
) -> Result<String, AppError> {
    params
        .get("imageName")
        .or_else(|| fields.get("imageName"))
        .cloned()
        .ok_or_else(|| AppError::Validation("Image name is required".to_string()))
}

async fn current_owner(state: &AppState, claims: &Claims) -> Result<Owner, AppError> {
    state.owners.query_owner_by_id(&claims.sub).await
}

/// POST /api/upload-image?imageName=
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let owner = current_owner(&state, &claims).await?;
    let (file, fields) = read_form(multipart).await?;
    let name = image_name(&params, &fields)?;
    let file = required_file(file)?;

    let record = state.lifecycle.upload(&owner, &name, &file).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Image uploaded successfully",
            "name": record.name,
            "url": record.url,
        })),
    ))
}

/// POST /api/image/detect?imageName=
pub async fn attach_detection_result(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let owner = current_owner(&state, &claims).await?;
    let (file, fields) = read_form(multipart).await?;
    let name = image_name(&params, &fields)?;
    let file = file.ok_or_else(|| {
        AppError::Validation("Detection result image missing".to_string())
    })?;
    let count = fields.get("count").map(String::as_str);

    let record = state
        .lifecycle
        .attach_result(&owner, &name, &file, count)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Object detection result saved",
        "res_url": record.res_url,
        "res_count": record.res_count,
    })))
}

/// GET /api/images
pub async fn list_images(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let owner = current_owner(&state, &claims).await?;
    Ok(Json(state.lifecycle.list(&owner).await?))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RenameReq {
    old_name: String,
    new_name: String,
}

/// PUT /api/image/update-name
pub async fn rename_image(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RenameReq>,
) -> Result<impl IntoResponse, AppError> {
    let owner = current_owner(&state, &claims).await?;
    state
        .lifecycle
        .rename(&owner, &req.old_name, &req.new_name)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Image and result renamed successfully",
    })))
}

/// PUT /api/image/update-file?imageName=
pub async fn replace_image(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let owner = current_owner(&state, &claims).await?;
    let (file, fields) = read_form(multipart).await?;
    let name = image_name(&params, &fields)?;
    let file = required_file(file)?;

    let record = state.lifecycle.replace(&owner, &name, &file).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Image file updated",
        "image": record,
    })))
}

/// DELETE /api/image/{imageName}
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(image_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let owner = current_owner(&state, &claims).await?;
    state.lifecycle.delete(&owner, &image_name).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Image and result deleted",
    })))
}
